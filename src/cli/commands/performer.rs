//! Performer classification and person/group records.

use std::path::Path;
use tokio::runtime::Runtime;

use super::open_store;
use crate::config::Config;
use crate::db::Store;
use crate::error::Error;
use crate::model::PerformerType;

/// Classify a performer; a person or group record is created if missing
pub fn cmd_classify(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    name: &str,
    kind: PerformerType,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        let id = store
            .exists_performer(name)
            .await?
            .ok_or_else(|| Error::not_found(format!("performer {name:?}")))?;

        store.update_performer_type(id, kind).await?;

        match kind {
            PerformerType::Person => {
                if store.exists_person(name).await?.is_none() {
                    let person_id = store.add_person(name, "", "", "").await?;
                    println!("Added person {person_id}: {name}");
                }
            }
            PerformerType::Group => {
                if store.exists_group(name).await?.is_none() {
                    let group_id = store.add_group(name, "", "").await?;
                    println!("Added group {group_id}: {name}");
                }
            }
            PerformerType::Unknown => {}
        }
        println!("{name} is now classified as {kind}");
        Ok(())
    })
}

pub fn cmd_person_add(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    stage_name: &str,
    real_name: &str,
    birth: &str,
    death: &str,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        if let Some(id) = store.exists_person(stage_name).await? {
            anyhow::bail!("person {stage_name:?} already exists (id {id})");
        }
        let id = store.add_person(stage_name, real_name, birth, death).await?;
        println!("Added person {id}: {stage_name}");
        Ok(())
    })
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_person_update(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    id: i64,
    stage_name: Option<&str>,
    real_name: Option<&str>,
    birth: Option<&str>,
    death: Option<&str>,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        let mut person = store
            .person(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("person {id}")))?;

        if let Some(v) = stage_name {
            person.stage_name = v.trim().to_string();
        }
        if let Some(v) = real_name {
            person.real_name = v.trim().to_string();
        }
        if let Some(v) = birth {
            person.birth_date = v.trim().to_string();
        }
        if let Some(v) = death {
            person.death_date = v.trim().to_string();
        }

        store.update_person(&person).await?;
        println!("Updated person {id}: {}", person.stage_name);
        Ok(())
    })
}

pub fn cmd_person_list(rt: &Runtime, config: &Config, db: Option<&Path>) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        print_named(&store.all_persons().await?);
        Ok(())
    })
}

pub fn cmd_group_add(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    name: &str,
    start: &str,
    end: &str,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        if let Some(id) = store.exists_group(name).await? {
            anyhow::bail!("group {name:?} already exists (id {id})");
        }
        let id = store.add_group(name, start, end).await?;
        println!("Added group {id}: {name}");
        Ok(())
    })
}

pub fn cmd_group_update(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    id: i64,
    name: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        let mut group = store
            .group(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("group {id}")))?;

        if let Some(v) = name {
            group.name = v.trim().to_string();
        }
        if let Some(v) = start {
            group.start_date = v.trim().to_string();
        }
        if let Some(v) = end {
            group.end_date = v.trim().to_string();
        }

        store.update_group(&group).await?;
        println!("Updated group {id}: {}", group.name);
        Ok(())
    })
}

/// Add a person to a group, both by name
pub fn cmd_group_join(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    person: &str,
    group: &str,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        let person_id = person_id(&store, person).await?;
        let group_id = group_id(&store, group).await?;

        store.add_person_to_group(person_id, group_id).await?;
        println!("{person} is a member of {group}");
        Ok(())
    })
}

pub fn cmd_group_members(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    group: &str,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        let group_id = group_id(&store, group).await?;

        let members = store.group_members(group_id).await?;
        if members.is_empty() {
            println!("{group} has no recorded members");
        }
        for member in members {
            println!("{member}");
        }
        Ok(())
    })
}

pub fn cmd_group_list(rt: &Runtime, config: &Config, db: Option<&Path>) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        print_named(&store.all_groups().await?);
        Ok(())
    })
}

async fn person_id(store: &Store, stage_name: &str) -> anyhow::Result<i64> {
    store
        .exists_person(stage_name)
        .await?
        .ok_or_else(|| Error::not_found(format!("person {stage_name:?}")).into())
}

async fn group_id(store: &Store, name: &str) -> anyhow::Result<i64> {
    store
        .exists_group(name)
        .await?
        .ok_or_else(|| Error::not_found(format!("group {name:?}")).into())
}

fn print_named(rows: &[(String, i64)]) {
    for (name, id) in rows {
        println!("{id:>6}  {name}");
    }
}
