//! §4.3 Select planner + JSON emission.
//!
//! Parses the JSON `select` array into a `RelationTree` (see
//! `query::relation`), then emits nested-subquery SQL where each relation is
//! a derived table LEFT/INNER-joined to its parent on the resolving foreign
//! key, aggregated back to one row per parent via `json_group_array` +
//! `GROUP BY`, matching §4.3's "SQL emission" walkthrough exactly.

use serde_json::Value as JsonValue;

use crate::error::GatewayError;
use crate::schema::SchemaSnapshot;
use crate::validator::{bracket, escape_literal, validate_identifier};

use super::pagination::Pagination;
use super::relation::{RelationTree, SelectColumn};

pub fn parse_select(
    table: &str,
    items: &[JsonValue],
    schema: &SchemaSnapshot,
    max_depth: usize,
) -> Result<RelationTree, GatewayError> {
    validate_identifier(table)?;
    schema.find_table(table)?;

    let mut tree = RelationTree::new(table);
    populate_node(&mut tree, RelationTree::ROOT, items, schema)?;

    let depth = tree.depth();
    if depth > max_depth {
        return Err(GatewayError::QueryTooDeep {
            depth,
            max: max_depth,
        });
    }
    Ok(tree)
}

fn populate_node(
    tree: &mut RelationTree,
    node_idx: usize,
    items: &[JsonValue],
    schema: &SchemaSnapshot,
) -> Result<(), GatewayError> {
    let node_name = tree.node(node_idx).name.clone();

    if items.is_empty() {
        tree.node_mut(node_idx).wants_star = true;
        return Ok(());
    }

    for item in items {
        match item {
            JsonValue::String(s) if s == "*" => {
                tree.node_mut(node_idx).wants_star = true;
            }
            JsonValue::String(col) => {
                validate_identifier(col)?;
                schema.find_column(&node_name, col)?;
                tree.node_mut(node_idx).columns.push(SelectColumn {
                    name: col.clone(),
                    alias: col.clone(),
                });
            }
            JsonValue::Object(obj) if obj.len() == 1 => {
                let (key, value) = obj.iter().next().expect("len == 1");
                match value {
                    JsonValue::String(col_name) => {
                        validate_identifier(key)?;
                        validate_identifier(col_name)?;
                        schema.find_column(&node_name, col_name)?;
                        tree.node_mut(node_idx).columns.push(SelectColumn {
                            name: col_name.clone(),
                            alias: key.clone(),
                        });
                    }
                    JsonValue::Array(nested) => {
                        add_relation(tree, node_idx, key, nested, false, schema)?;
                    }
                    JsonValue::Object(relation_obj) => {
                        let nested = relation_obj
                            .get("select")
                            .and_then(|v| v.as_array())
                            .cloned()
                            .unwrap_or_default();
                        let inner = relation_obj
                            .get("inner")
                            .and_then(|v| v.as_bool())
                            .unwrap_or(false);
                        add_relation(tree, node_idx, key, &nested, inner, schema)?;
                    }
                    _ => return Err(GatewayError::internal("invalid select item shape")),
                }
            }
            _ => return Err(GatewayError::internal("invalid select item shape")),
        }
    }
    Ok(())
}

fn add_relation(
    tree: &mut RelationTree,
    parent_idx: usize,
    relation_name: &str,
    nested_items: &[JsonValue],
    inner: bool,
    schema: &SchemaSnapshot,
) -> Result<(), GatewayError> {
    validate_identifier(relation_name)?;
    schema.find_table(relation_name)?;
    let parent_name = tree.node(parent_idx).name.clone();
    let fk = schema.find_foreign_key(relation_name, &parent_name)?.clone();

    let child_idx = tree.push_child(parent_idx, relation_name, relation_name, inner, fk);
    populate_node(tree, child_idx, nested_items, schema)
}

fn resolve_projected_columns(
    tree: &RelationTree,
    idx: usize,
    schema: &SchemaSnapshot,
) -> Result<Vec<SelectColumn>, GatewayError> {
    let node = tree.node(idx);
    let table = schema.find_table(&node.name)?;

    let mut result = Vec::new();
    if node.wants_star {
        for col in table.non_blob_columns() {
            result.push(SelectColumn {
                name: col.name.clone(),
                alias: col.name.clone(),
            });
        }
    }
    for col in &node.columns {
        if !result.iter().any(|r| r.alias == col.alias) {
            result.push(col.clone());
        }
    }
    Ok(result)
}

fn is_blob(table: &str, column: &str, schema: &SchemaSnapshot) -> bool {
    schema
        .find_column(table, column)
        .map(|c| c.column_type == crate::schema::ColumnType::Blob)
        .unwrap_or(false)
}

fn column_ref(alias_prefix: Option<&str>, col: &str) -> String {
    match alias_prefix {
        Some(prefix) => format!("{}.{}", bracket(prefix), bracket(col)),
        None => bracket(col),
    }
}

/// The `json_object(...)` key/value pair list this node contributes, either
/// to its own root wrap (`alias_prefix = None`, referencing the flat output
/// columns of its own subquery) or to a parent's aggregation
/// (`alias_prefix = Some(join_alias)`).
fn build_aggregation_pairs(
    tree: &RelationTree,
    idx: usize,
    schema: &SchemaSnapshot,
    alias_prefix: Option<&str>,
) -> Result<String, GatewayError> {
    let node = tree.node(idx);
    let projected = resolve_projected_columns(tree, idx, schema)?;

    let mut pairs = Vec::new();
    for col in projected.iter().filter(|c| !is_blob(&node.name, &c.name, schema)) {
        pairs.push(format!(
            "'{}', {}",
            escape_literal(&col.alias),
            column_ref(alias_prefix, &col.alias)
        ));
    }
    for &child_idx in &node.children {
        let child = tree.node(child_idx);
        pairs.push(format!(
            "'{}', json({})",
            escape_literal(&child.alias),
            column_ref(alias_prefix, &child.alias)
        ));
    }
    Ok(pairs.join(", "))
}

/// Self-contained `SELECT ... FROM ... <joins> [GROUP BY ...]` for this
/// node, with no `WHERE`/`ORDER BY`/`LIMIT` — those only ever apply at the
/// root and are spliced in by `build_select`.
fn build_node_query(
    tree: &RelationTree,
    idx: usize,
    schema: &SchemaSnapshot,
) -> Result<String, GatewayError> {
    let (main, group_by) = build_node_query_parts(tree, idx, schema)?;
    Ok(format!("{main}{group_by}"))
}

/// Same SQL as `build_node_query`, but with the `GROUP BY` clause (if any)
/// kept separate from the `SELECT ... FROM ... [JOINS]` body. `build_select`
/// needs this split for the root node specifically, so it can splice `WHERE`
/// in between the two without scanning the already-built SQL text for a
/// `GROUP BY` keyword that a non-leaf child's own subquery may also contain.
fn build_node_query_parts(
    tree: &RelationTree,
    idx: usize,
    schema: &SchemaSnapshot,
) -> Result<(String, String), GatewayError> {
    let node = tree.node(idx);
    let table_ident = bracket(&node.name);
    let projected = resolve_projected_columns(tree, idx, schema)?;

    let mut select_cols: Vec<String> = projected
        .iter()
        .map(|c| {
            format!(
                "{}.{} AS {}",
                table_ident,
                bracket(&c.name),
                bracket(&c.alias)
            )
        })
        .collect();

    // The child subquery always projects its own FK column, even when the
    // caller never selected it, so the parent's FILTER can test it.
    if let Some(fk) = &node.fk {
        if !projected.iter().any(|c| c.name == fk.from_column) {
            select_cols.push(format!(
                "{}.{} AS {}",
                table_ident,
                bracket(&fk.from_column),
                bracket(&fk.from_column)
            ));
        }
    }

    let mut joins = Vec::new();
    for &child_idx in &node.children {
        let child = tree.node(child_idx);
        let child_fk = child.fk.as_ref().expect("non-root node always has an fk");
        let child_sql = build_node_query(tree, child_idx, schema)?;
        let join_kind = if child.inner { "INNER JOIN" } else { "LEFT JOIN" };
        let child_alias = bracket(&child.alias);

        joins.push(format!(
            "{join_kind} ({child_sql}) AS {child_alias} ON {}.{} = {child_alias}.{}",
            table_ident,
            bracket(&child_fk.to_column),
            bracket(&child_fk.from_column)
        ));

        let child_aggregation = build_aggregation_pairs(tree, child_idx, schema, Some(&child.alias))?;
        select_cols.push(format!(
            "COALESCE(json_group_array(json_object({child_aggregation})) FILTER (WHERE {child_alias}.{} IS NOT NULL), '[]') AS {}",
            bracket(&child_fk.from_column),
            bracket(&child.alias)
        ));
    }

    let mut sql = format!("SELECT {} FROM {}", select_cols.join(", "), table_ident);
    for join in &joins {
        sql.push(' ');
        sql.push_str(join);
    }

    let mut group_by = String::new();
    if !node.children.is_empty() {
        let mut group_cols: Vec<String> = projected
            .iter()
            .map(|c| format!("{table_ident}.{}", bracket(&c.name)))
            .collect();
        if let Some(fk) = &node.fk {
            let fk_col = format!("{table_ident}.{}", bracket(&fk.from_column));
            if !group_cols.contains(&fk_col) {
                group_cols.push(fk_col);
            }
        }
        let table_schema = schema.find_table(&node.name)?;
        let pk_col = format!(
            "{table_ident}.{}",
            bracket(table_schema.row_identity_column())
        );
        if !group_cols.contains(&pk_col) {
            group_cols.push(pk_col);
        }
        group_by = format!(" GROUP BY {}", group_cols.join(", "));
    }

    Ok((sql, group_by))
}

/// Final wrapped SQL for the select operation, plus the count-only SQL used
/// for `count=exact` (§4.3 "Execution").
pub struct CompiledSelect {
    pub data_sql: String,
    pub count_sql: String,
}

pub fn build_select(
    tree: &RelationTree,
    schema: &SchemaSnapshot,
    where_sql: &str,
    order_sql: &str,
    pagination: Pagination,
) -> Result<CompiledSelect, GatewayError> {
    let (pre_group, group_by) = build_node_query_parts(tree, RelationTree::ROOT, schema)?;

    let mut root_query = pre_group;
    if !where_sql.is_empty() {
        root_query.push_str(&format!(" WHERE {where_sql}"));
    }
    root_query.push_str(&group_by);

    let count_sql = format!("SELECT COUNT(*) FROM ({root_query})");

    if !order_sql.is_empty() {
        root_query.push(' ');
        root_query.push_str(order_sql);
    }
    let pagination_sql = pagination.to_sql();
    if !pagination_sql.is_empty() {
        root_query.push(' ');
        root_query.push_str(&pagination_sql);
    }

    let aggregation = build_aggregation_pairs(tree, RelationTree::ROOT, schema, None)?;
    let data_sql = format!(
        "SELECT json_group_array(json_object({aggregation})) AS data FROM ({root_query})"
    );

    Ok(CompiledSelect { data_sql, count_sql })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, ForeignKey, Table};
    use serde_json::json;

    fn users_posts_schema() -> SchemaSnapshot {
        let mut schema = SchemaSnapshot::default();

        let mut users = Table::new("users");
        users.primary_key = Some("id".to_string());
        users.columns.push(Column::new("id", ColumnType::Integer));
        users.columns.push(Column::new("name", ColumnType::Text));
        schema.tables.insert("users".to_string(), users);

        let mut posts = Table::new("posts");
        posts.primary_key = Some("id".to_string());
        posts.columns.push(Column::new("id", ColumnType::Integer));
        posts.columns.push(Column::new("user_id", ColumnType::Integer));
        posts.columns.push(Column::new("title", ColumnType::Text));
        schema.tables.insert("posts".to_string(), posts);

        schema.foreign_keys.insert(
            "posts".to_string(),
            vec![ForeignKey {
                table: "posts".to_string(),
                references_table: "users".to_string(),
                from_column: "user_id".to_string(),
                to_column: "id".to_string(),
            }],
        );

        schema
    }

    #[test]
    fn parses_nested_relation_tree() {
        let schema = users_posts_schema();
        let items = vec![
            json!("id"),
            json!("name"),
            json!({"posts": ["title"]}),
        ];
        let tree = parse_select("users", &items, &schema, 5).unwrap();
        assert_eq!(tree.nodes.len(), 2);
        assert_eq!(tree.node(1).name, "posts");
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn rejects_relation_without_foreign_key() {
        let schema = users_posts_schema();
        let items = vec![json!({"users": ["name"]})];
        let err = parse_select("posts", &items, &schema, 5).unwrap_err();
        assert!(matches!(err, GatewayError::NoRelationship { .. }));
    }

    #[test]
    fn depth_bound_enforced() {
        let schema = users_posts_schema();
        let items = vec![json!({"posts": ["title"]})];
        let err = parse_select("users", &items, &schema, 1).unwrap_err();
        assert!(matches!(err, GatewayError::QueryTooDeep { .. }));
    }

    #[test]
    fn emits_coalesced_join_and_group_by() {
        let schema = users_posts_schema();
        let items = vec![json!("id"), json!("name"), json!({"posts": ["title"]})];
        let tree = parse_select("users", &items, &schema, 5).unwrap();
        let compiled = build_select(
            &tree,
            &schema,
            "[users].[id] = ?",
            "",
            Pagination {
                limit: None,
                offset: 0,
            },
        )
        .unwrap();

        assert!(compiled.data_sql.contains("json_group_array(json_object("));
        assert!(compiled.data_sql.contains("LEFT JOIN"));
        assert!(compiled.data_sql.contains("GROUP BY"));
        assert!(compiled.data_sql.contains("FILTER (WHERE"));
        assert!(compiled.count_sql.starts_with("SELECT COUNT(*) FROM ("));
    }

    fn users_posts_comments_schema() -> SchemaSnapshot {
        let mut schema = users_posts_schema();

        let mut comments = Table::new("comments");
        comments.primary_key = Some("id".to_string());
        comments.columns.push(Column::new("id", ColumnType::Integer));
        comments.columns.push(Column::new("post_id", ColumnType::Integer));
        comments.columns.push(Column::new("body", ColumnType::Text));
        schema.tables.insert("comments".to_string(), comments);

        schema.foreign_keys.insert(
            "comments".to_string(),
            vec![ForeignKey {
                table: "comments".to_string(),
                references_table: "posts".to_string(),
                from_column: "post_id".to_string(),
                to_column: "id".to_string(),
            }],
        );

        schema
    }

    /// Depth-3 root → child → grandchild: the middle node (`posts`) is a
    /// non-leaf and so emits its own `GROUP BY` inside the root's FROM/JOIN
    /// list, well before the root's own trailing `GROUP BY`. A naive
    /// `find(" GROUP BY ")` splice would inject the root's `WHERE` into that
    /// nested subquery instead of the root query.
    #[test]
    fn where_is_spliced_at_the_root_not_a_nested_group_by() {
        let schema = users_posts_comments_schema();
        let items = vec![
            json!("id"),
            json!({"posts": ["title", {"comments": ["body"]}]}),
        ];
        let tree = parse_select("users", &items, &schema, 5).unwrap();
        let compiled = build_select(
            &tree,
            &schema,
            "[users].[id] = ?",
            "",
            Pagination {
                limit: None,
                offset: 0,
            },
        )
        .unwrap();

        // The `posts` derived table's own nested GROUP BY must close out
        // before the root's WHERE appears, and the root's own GROUP BY must
        // come after the WHERE, not before it.
        let nested_group_by = compiled
            .data_sql
            .find("GROUP BY [posts]")
            .expect("nested posts GROUP BY present");
        let where_pos = compiled
            .data_sql
            .find("WHERE [users].[id] = ?")
            .expect("root WHERE clause present");
        let root_group_by = compiled
            .data_sql
            .rfind("GROUP BY [users]")
            .expect("root GROUP BY present");

        assert!(nested_group_by < where_pos, "WHERE must follow the nested subquery, not land inside it");
        assert!(where_pos < root_group_by, "root GROUP BY must follow the spliced WHERE");
    }
}
