use crate::error;
use crate::{CreateOwnerArgs, OwnerArgs, QuotaArgs};

fn owner_id(given: &str) -> error::Result<&str> {
    let trimmed = given.trim();

    if trimmed.is_empty() {
        Err(error::Error::Invalid("owner id must not be empty".into()))
    } else {
        Ok(trimmed)
    }
}

/// byte counts are stored as bigint
fn bytes(given: u64) -> error::Result<i64> {
    i64::try_from(given)
        .map_err(|_| error::Error::Invalid(format!("{given} bytes is too large")))
}

pub async fn create(args: &CreateOwnerArgs) -> error::Result<()> {
    let id = owner_id(&args.id)?;
    let quota = bytes(args.quota)?;
    let conn = args.db.connect().await?;

    let inserted = conn.execute(
        "\
        insert into owners (id, quota) values ($1, $2) \
        on conflict (id) do nothing",
        &[&id, &quota]
    ).await?;

    if inserted == 0 {
        return Err(error::Error::OwnerExists(id.to_owned()));
    }

    println!("created owner \"{id}\" with a quota of {quota} bytes");

    Ok(())
}

pub async fn quota(args: &QuotaArgs) -> error::Result<()> {
    let id = owner_id(&args.id)?;
    let quota = bytes(args.bytes)?;
    let conn = args.db.connect().await?;

    let updated = conn.execute(
        "update owners set quota = $2 where id = $1",
        &[&id, &quota]
    ).await?;

    if updated == 0 {
        return Err(error::Error::UnknownOwner(id.to_owned()));
    }

    println!("owner \"{id}\" quota set to {quota} bytes");

    Ok(())
}

pub async fn deactivate(args: &OwnerArgs) -> error::Result<()> {
    let id = owner_id(&args.id)?;
    let conn = args.db.connect().await?;

    let updated = conn.execute(
        "update owners set is_active = false where id = $1",
        &[&id]
    ).await?;

    if updated == 0 {
        return Err(error::Error::UnknownOwner(id.to_owned()));
    }

    println!("owner \"{id}\" deactivated");

    Ok(())
}
