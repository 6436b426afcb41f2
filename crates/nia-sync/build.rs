//! 编译期生成 BUILD_TIMESTAMP 元信息（供 version.rs 使用）
//! 以及 SDK_DB_VERSION（从 migrations/ 目录扫描 V{version}__*.sql 取最大版本号）

use std::env;
use std::fs;
use std::path::Path;
use vergen::EmitBuilder;

fn main() {
    let _ = EmitBuilder::builder().build_timestamp().emit();

    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let migrations_dir = Path::new(&manifest_dir).join("migrations");
    let mut max_version: i64 = 0;
    if let Ok(entries) = fs::read_dir(&migrations_dir) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(s) = name.to_str() else { continue };
            // refinery 格式: V{version}__{name}.sql
            if let Some(rest) = s.strip_prefix('V').and_then(|r| r.strip_suffix(".sql")) {
                if let Some(Ok(v)) = rest.split("__").next().map(str::parse::<i64>) {
                    max_version = max_version.max(v);
                }
            }
        }
    }
    println!("cargo:rustc-env=SDK_DB_VERSION={}", max_version);
    println!("cargo:rerun-if-changed=migrations/");
}
