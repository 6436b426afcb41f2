//! 数据库迁移与初始化 - 由 refinery 自动管理
//!
//! - Migration 版本 = migrations/ 下 V{n}__{name}.sql 的 n，编译期嵌入、自动执行。
//! - 统一入口 `init_db`：pragmas → migrate → 版本校验。

mod embedded {
    use refinery::embed_migrations;

    embed_migrations!("./migrations");
}

use rusqlite::Connection;

use crate::error::{NiaSyncError, Result};
use crate::version::SDK_DB_VERSION;

/// refinery 使用的 migration 历史表名
const REFINERY_TABLE: &str = "refinery_schema_history";

/// NORMAL 同步、外键（交叉引用表依赖级联删除）、内存临时表。
const STORE_PRAGMAS: &[(&str, &str)] = &[
    ("synchronous", "NORMAL"),
    ("foreign_keys", "ON"),
    ("temp_store", "MEMORY"),
];

pub fn enable_pragmas(conn: &Connection) -> Result<()> {
    // journal_mode 会返回结果行；内存库返回 "memory"
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(|e| NiaSyncError::Database(format!("设置 journal_mode 失败: {}", e)))?;
    tracing::debug!("journal_mode={}", mode);
    for (name, value) in STORE_PRAGMAS {
        conn.pragma_update(None, *name, *value)
            .map_err(|e| NiaSyncError::Database(format!("设置 PRAGMA {} 失败: {}", name, e)))?;
    }
    Ok(())
}

/// 执行内置 migrations（按版本顺序）
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    embedded::migrations::runner()
        .run(conn)
        .map_err(|e| NiaSyncError::Migration(format!("执行 migration 失败: {}", e)))?;
    Ok(())
}

/// 当前数据库的 migration 版本；无表或空表返回 None。
fn get_db_migration_version(conn: &Connection) -> Result<Option<i64>> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
            [REFINERY_TABLE],
            |row| row.get(0),
        )
        .map_err(|e| NiaSyncError::Database(format!("查询 {} 失败: {}", REFINERY_TABLE, e)))?;

    if !exists {
        return Ok(None);
    }

    let version: Option<i64> = conn
        .query_row(
            &format!("SELECT MAX(version) FROM {}", REFINERY_TABLE),
            [],
            |row| row.get::<_, Option<i64>>(0),
        )
        .map_err(|e| NiaSyncError::Database(format!("读取 migration 版本失败: {}", e)))?;

    Ok(version.filter(|&v| v > 0))
}

/// DB 版本高于本库支持的最高版本时拒绝打开（降级后 schema 不兼容）
fn check_db_version(conn: &Connection) -> Result<()> {
    let Some(v) = get_db_migration_version(conn)? else {
        return Ok(());
    };
    if v > SDK_DB_VERSION {
        return Err(NiaSyncError::Migration(format!(
            "数据库版本 {} 高于当前支持的最高版本 {}",
            v, SDK_DB_VERSION
        )));
    }
    Ok(())
}

/// 统一初始化入口，打开连接后调用一次
pub fn init_db(conn: &mut Connection) -> Result<()> {
    enable_pragmas(conn)?;
    run_migrations(conn)?;
    check_db_version(conn)?;
    Ok(())
}
