use crate::db::relational_db::RelationalDB;
use crate::error::{DBError, PlanError};
use crate::sql::ast::{compile_to_ast, Column, From, Join, Selection, SqlAst};
use core::ops::Deref;
use spacetimedb_data_structures::map::HashMap;
use spacetimedb_sats::db::auth::StAccess;
use spacetimedb_sats::db::def::{TableDef, TableSchema};
use spacetimedb_sats::relation::{self, DbTable, FieldExpr, FieldName, Header};
use spacetimedb_vm::expr::{CrudExpr, DbType, Expr, QueryExpr, SourceExpr};
use spacetimedb_vm::operator::OpCmp;
use std::sync::Arc;

use super::ast::TableSchemaView;

/// DIRTY HACK ALERT: Maximum allowed length, in UTF-8 bytes, of SQL queries.
/// Any query longer than this will be rejected.
/// This prevents a stack overflow when compiling queries with deeply-nested `AND` and `OR` conditions.
const MAX_SQL_LENGTH: usize = 50_000;

/// Compile the `SQL` expression into an `ast`
pub fn compile_sql<T: TableSchemaView>(db: &RelationalDB, tx: &T, sql_text: &str) -> Result<Vec<CrudExpr>, DBError> {
    if sql_text.len() > MAX_SQL_LENGTH {
        return Err(anyhow::anyhow!("SQL query exceeds maximum allowed length: \"{sql_text:.120}...\"").into());
    }
    tracing::trace!(sql = sql_text);
    let ast = compile_to_ast(db, tx, sql_text)?;

    // TODO(perf, bikeshedding): SmallVec?
    let mut results = Vec::with_capacity(ast.len());

    for sql in ast {
        results.push(compile_statement(db, sql).map_err(|error| DBError::Plan {
            sql: sql_text.to_string(),
            error,
        })?);
    }

    Ok(results)
}

fn expr_for_projection(table: &From, of: Expr) -> Result<FieldExpr, PlanError> {
    match of {
        Expr::Ident(x) => table.find_field(&x).map(|(f, _)| FieldExpr::Name(f)),
        Expr::Value(x) => Ok(FieldExpr::Value(x)),
        x => unreachable!("Wrong expression in SQL query {:?}", x),
    }
}

/// Compiles a `WHERE ...` clause
fn compile_where(mut q: QueryExpr, filter: Selection) -> QueryExpr {
    for op in filter.clause.flatten_ands() {
        q = q.with_select(op);
    }
    q
}

/// Compiles a `SELECT ...` clause
fn compile_select(table: From, project: Vec<Column>, selection: Option<Selection>) -> Result<QueryExpr, PlanError> {
    let mut not_found = Vec::with_capacity(project.len());
    let mut col_ids = Vec::new();
    let mut qualified_wildcards = Vec::new();
    //Match columns to their tables...
    for select_item in project {
        match select_item {
            Column::UnnamedExpr(x) => match expr_for_projection(&table, x) {
                Ok(field) => col_ids.push(field),
                Err(PlanError::UnknownField { field, tables: _ }) => not_found.push(field),
                Err(err) => return Err(err),
            },
            Column::QualifiedWildcard { table: name } => {
                if let Some(t) = table.iter_tables().find(|x| *x.table_name == name) {
                    for c in t.columns().iter() {
                        col_ids.push(FieldName::new(t.table_id, c.col_pos).into());
                    }
                    qualified_wildcards.push(t.table_id);
                } else {
                    return Err(PlanError::TableNotFoundQualified { expect: name });
                }
            }
            Column::Wildcard => {}
        }
    }

    if !not_found.is_empty() {
        return Err(PlanError::UnknownFields {
            fields: not_found,
            tables: table.table_names(),
        });
    }

    let source_expr: SourceExpr = table.root.deref().into();
    let mut q = QueryExpr::new(source_expr);

    for join in table.joins {
        match join {
            Join::Inner { rhs, on } => {
                let rhs_source_expr: SourceExpr = rhs.deref().into();
                match on.op {
                    OpCmp::Eq => {}
                    x => unreachable!("Unsupported operator `{x}` for joins"),
                }
                // Always construct inner joins, never semijoins.
                // The query optimizer can rewrite certain inner joins into semijoins later in the pipeline.
                // The full pipeline for a query like `SELECT lhs.* FROM lhs JOIN rhs ON lhs.a = rhs.a` is:
                // - We produce `[JoinInner(semi: false), Project]`.
                // - Optimizer rewrites to `[JoinInner(semi: true)]`.
                // - Optimizer rewrites to `[IndexJoin]`.
                // For incremental queries, this all happens on the original query with `DbTable` sources.
                // Then, the query is "incrementalized" by replacing the sources with `MemTable`s,
                // and the `IndexJoin` is rewritten back into a `JoinInner(semi: true)`.
                q = q.with_join_inner(rhs_source_expr, on.lhs, on.rhs, false);
            }
        }
    }

    if let Some(filter) = selection {
        q = compile_where(q, filter);
    }
    // It is important to project at the end.
    // This is so joins and filters see fields that are not projected.
    // It is also important to identify a wildcard project of the form `table.*`.
    // This implies a potential semijoin and additional optimization opportunities.
    let qualified_wildcard = (qualified_wildcards.len() == 1).then(|| qualified_wildcards[0]);
    q = q.with_project(&col_ids, qualified_wildcard);

    Ok(q)
}

/// Builds the schema description [DbTable] from the [TableSchema] and their list of columns
fn compile_columns(table: &TableSchema, field_names: Vec<FieldName>) -> DbTable {
    let mut columns = Vec::with_capacity(field_names.len());
    let cols = field_names
        .into_iter()
        .filter_map(|col| table.get_column_by_field(col))
        .map(|col| relation::Column::new(FieldName::new(table.table_id, col.col_pos), col.col_type.clone()));
    columns.extend(cols);

    let header = Arc::new(Header::new(
        table.table_id,
        table.table_name.clone(),
        columns,
        table.get_constraints(),
    ));

    DbTable::new(header, table.table_id, table.table_type, table.table_access)
}

/// Compiles a `INSERT ...` clause
fn compile_insert(table: &TableSchema, columns: Vec<FieldName>, values: Vec<Vec<FieldExpr>>) -> CrudExpr {
    let table = compile_columns(table, columns);

    let mut rows = Vec::with_capacity(values.len());
    for x in values {
        let mut row = Vec::with_capacity(x.len());
        for v in x {
            match v {
                FieldExpr::Name(x) => {
                    todo!("Deal with idents in insert?: {}", x)
                }
                FieldExpr::Value(x) => {
                    row.push(x);
                }
            }
        }
        rows.push(row.into())
    }

    CrudExpr::Insert { table, rows }
}

/// Compiles a `DELETE ...` clause
fn compile_delete(table: Arc<TableSchema>, selection: Option<Selection>) -> CrudExpr {
    let query = QueryExpr::new(&*table);
    let query = if let Some(filter) = selection {
        compile_where(query, filter)
    } else {
        query
    };
    CrudExpr::Delete { query }
}

/// Compiles a `UPDATE ...` clause
fn compile_update(
    table: Arc<TableSchema>,
    assignments: HashMap<FieldName, FieldExpr>,
    selection: Option<Selection>,
) -> CrudExpr {
    let query = QueryExpr::new(&*table);
    let delete = if let Some(filter) = selection {
        compile_where(query, filter)
    } else {
        query
    };

    CrudExpr::Update { delete, assignments }
}

/// Compiles a `CREATE TABLE ...` clause
fn compile_create_table(table: TableDef) -> CrudExpr {
    CrudExpr::CreateTable { table }
}

/// Compiles a `DROP ...` clause
fn compile_drop(name: String, kind: DbType, table_access: StAccess) -> CrudExpr {
    CrudExpr::Drop {
        name,
        kind,
        table_access,
    }
}

/// Compiles a `SQL` clause
fn compile_statement(db: &RelationalDB, statement: SqlAst) -> Result<CrudExpr, PlanError> {
    let q = match statement {
        SqlAst::Select {
            from,
            project,
            selection,
        } => CrudExpr::Query(compile_select(from, project, selection)?),
        SqlAst::Insert { table, columns, values } => compile_insert(&table, columns, values),
        SqlAst::Update {
            table,
            assignments,
            selection,
        } => compile_update(table, assignments, selection),
        SqlAst::Delete { table, selection } => compile_delete(table, selection),
        SqlAst::CreateTable { table } => compile_create_table(table),
        SqlAst::Drop {
            name,
            kind,
            table_access,
        } => compile_drop(name, kind, table_access),
        SqlAst::SetVar { name, value } => CrudExpr::SetVar { name, value },
        SqlAst::ReadVar { name } => CrudExpr::ReadVar { name },
    };

    Ok(q.optimize(&|table_id, table_name| db.row_count(table_id, table_name)))
}
