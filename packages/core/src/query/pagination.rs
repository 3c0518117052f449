//! §4.3 Pagination. Negative values are treated as absent; the effective
//! limit is clamped to `[0, MaxQueryLimit]`.

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    /// `None` disables the `LIMIT` clause entirely.
    pub limit: Option<i64>,
    pub offset: i64,
}

pub fn clamp(
    limit: Option<i64>,
    offset: Option<i64>,
    max_query_limit: i64,
    default_limit: i64,
) -> Pagination {
    let requested = limit.filter(|v| *v >= 0).unwrap_or(default_limit);
    let clamped = requested.clamp(0, max_query_limit);
    let effective_limit = if clamped == 0 { None } else { Some(clamped) };

    let effective_offset = offset.filter(|v| *v >= 0).unwrap_or(0);

    Pagination {
        limit: effective_limit,
        offset: effective_offset,
    }
}

impl Pagination {
    pub fn to_sql(self) -> String {
        match self.limit {
            Some(limit) => format!("LIMIT {limit} OFFSET {}", self.offset),
            None => String::new(),
        }
    }
}
