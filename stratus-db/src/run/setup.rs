use std::path::{Path, PathBuf};

use crate::error;
use crate::SetupArgs;

/// the sql files of the setup directory in name order
fn setup_files(dir: &Path) -> error::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().map(|ext| ext == "sql").unwrap_or(false) {
            files.push(path);
        }
    }

    files.sort();

    Ok(files)
}

/// splits a file into its statements, dropping empty ones
fn statements(file_sql: &str) -> impl Iterator<Item = &str> {
    file_sql.split(';')
        .map(str::trim)
        .filter(|sql| !sql.is_empty())
}

/// applies every setup file in a single transaction. nothing is kept when
/// a statement fails or a rollback was asked for
pub async fn run(args: &SetupArgs) -> error::Result<()> {
    let files = setup_files(&args.dir)?;

    if files.is_empty() {
        return Err(error::Error::Invalid(format!(
            "no sql files found in \"{}\"", args.dir.display()
        )));
    }

    let mut conn = args.db.connect().await?;
    let transaction = conn.transaction().await?;

    for path in files {
        let file_sql = std::fs::read_to_string(&path)?;

        for sql in statements(&file_sql) {
            if let Err(source) = transaction.execute(sql, &[]).await {
                transaction.rollback().await?;

                return Err(error::Error::Setup {
                    file: path.display().to_string(),
                    sql: sql.to_owned(),
                    source,
                });
            }
        }

        tracing::info!("applied \"{}\"", path.display());
    }

    if args.rollback {
        transaction.rollback().await?;

        println!("setup finished, changes rolled back");
    } else {
        transaction.commit().await?;

        println!("setup finished");
    }

    Ok(())
}
