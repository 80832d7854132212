use spacetimedb_lib::identity::AuthCtx;
use spacetimedb_lib::relation::MemTable;
use spacetimedb_sats::{ProductType, ProductValue};
use spacetimedb_vm::eval::run_ast;
use spacetimedb_vm::expr::{CodeResult, CrudExpr, Expr};

use crate::database_instance_context_controller::DatabaseInstanceContextController;
use crate::db::datastore::locking_tx_datastore::MutTxId;
use crate::db::relational_db::RelationalDB;
use crate::error::{DBError, DatabaseError};
use crate::sql::compiler::compile_sql;
use crate::vm::DbProgram;

pub struct StmtResult {
    pub schema: ProductType,
    pub rows: Vec<ProductValue>,
}

// TODO(cloutiertyler): we could do this the swift parsing way in which
// we always generate a plan, but it may contain errors

/// Run a `SQL` query/statement in the specified `database_instance_id`.
#[tracing::instrument(skip_all)]
pub fn execute(
    db_inst_ctx_controller: &DatabaseInstanceContextController,
    database_instance_id: u64,
    sql_text: String,
    auth: AuthCtx,
) -> Result<Vec<MemTable>, DBError> {
    if let Some((database_instance_context, _)) = db_inst_ctx_controller.get(database_instance_id) {
        database_instance_context
            .relational_db
            .with_auto_commit(|tx| run(&database_instance_context.relational_db, tx, &sql_text, auth))
    } else {
        Err(DatabaseError::NotFound(database_instance_id).into())
    }
}

fn collect_result(result: &mut Vec<MemTable>, r: CodeResult) -> Result<(), DBError> {
    match r {
        CodeResult::Value(_) => {}
        CodeResult::Table(x) => result.push(x),
        CodeResult::Block(lines) => {
            for x in lines {
                collect_result(result, x)?;
            }
        }
        CodeResult::Halt(err) => return Err(DBError::VmUser(err)),
        CodeResult::Pass => {}
    }

    Ok(())
}

#[tracing::instrument(skip(db, tx, auth))]
pub fn execute_single_sql(
    db: &RelationalDB,
    tx: &mut MutTxId,
    ast: CrudExpr,
    auth: AuthCtx,
) -> Result<Vec<MemTable>, DBError> {
    let p = &mut DbProgram::new(db, tx, auth);
    let q = Expr::Crud(Box::new(ast));

    let mut result = Vec::with_capacity(1);
    collect_result(&mut result, run_ast(p, q).into())?;
    Ok(result)
}

/// Run the compiled `SQL` expression inside the `vm` created by [DbProgram]
#[tracing::instrument(skip_all)]
pub fn execute_sql(
    db: &RelationalDB,
    tx: &mut MutTxId,
    ast: Vec<CrudExpr>,
    auth: AuthCtx,
) -> Result<Vec<MemTable>, DBError> {
    let total = ast.len();

    let p = &mut DbProgram::new(db, tx, auth);
    let q = Expr::Block(ast.into_iter().map(|x| Expr::Crud(Box::new(x))).collect());

    let mut result = Vec::with_capacity(total);
    collect_result(&mut result, run_ast(p, q).into())?;
    Ok(result)
}

/// Run the `SQL` string using the `auth` credentials
#[tracing::instrument(skip_all)]
pub(crate) fn run(
    db: &RelationalDB,
    tx: &mut MutTxId,
    sql_text: &str,
    auth: AuthCtx,
) -> Result<Vec<MemTable>, DBError> {
    let ast = compile_sql(db, tx, sql_text)?;
    execute_sql(db, tx, ast, auth)
}
