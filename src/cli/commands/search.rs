//! Search, track details and tag edits.

use std::path::Path;
use tokio::runtime::Runtime;

use super::{TrackEdit, open_store, print_tracks, track_line};
use crate::config::Config;
use crate::db::Store;
use crate::error::Error;
use crate::library;
use crate::model::{PerformerType, Track};
use crate::query::{PREFIX, Parser};

/// Search with plain text or a structured query
pub fn cmd_search(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    text: &str,
    json: bool,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        let parser = Parser::new();
        if text.starts_with(PREFIX) && !parser.parse(text).is_filter() {
            eprintln!("No recognizable query terms, matching every track.");
        }
        let ids = library::search(&store, &parser, text).await?;

        let mut tracks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(track) = store.track(id).await? {
                tracks.push(track);
            }
        }
        print_tracks(&tracks, json)
    })
}

/// Show one track and what is known about its performer
pub fn cmd_show(rt: &Runtime, config: &Config, db: Option<&Path>, id: i64) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        let track = fetch_track(&store, id).await?;

        println!("Title:    {}", track.title);
        println!("Artist:   {}", track.artist);
        println!("Album:    {}", track.album);
        println!("Track:    {}", track.track);
        println!("Year:     {}", track.year);
        println!("Genre:    {}", track.genre);
        println!("Path:     {}", track.path);

        let Some((performer_id, album_id)) = store.track_foreign_keys(id).await? else {
            return Ok(());
        };
        if let Some(album) = store.album(album_id).await? {
            println!("Album dir: {} ({})", album.path, album.year);
        }
        let Some(performer) = store.performer(performer_id).await? else {
            return Ok(());
        };
        println!("Performer type: {}", performer.kind);

        match performer.kind {
            PerformerType::Person => {
                if let Some(person_id) = store.exists_person(&performer.name).await?
                    && let Some(person) = store.person(person_id).await?
                {
                    if !person.real_name.is_empty() {
                        println!("Real name: {}", person.real_name);
                    }
                    if !person.birth_date.is_empty() {
                        println!("Born:      {}", person.birth_date);
                    }
                    if !person.death_date.is_empty() {
                        println!("Died:      {}", person.death_date);
                    }
                    let groups = store.person_groups(person_id).await?;
                    if !groups.is_empty() {
                        println!("Groups:    {}", groups.join(", "));
                    }
                }
            }
            PerformerType::Group => {
                if let Some(group_id) = store.exists_group(&performer.name).await?
                    && let Some(group) = store.group(group_id).await?
                {
                    if !group.start_date.is_empty() || !group.end_date.is_empty() {
                        println!("Active:    {} - {}", group.start_date, group.end_date);
                    }
                    let members = store.group_members(group_id).await?;
                    if !members.is_empty() {
                        println!("Members:   {}", members.join(", "));
                    }
                }
            }
            PerformerType::Unknown => {}
        }
        Ok(())
    })
}

/// Change stored tags of a track
pub fn cmd_edit(
    rt: &Runtime,
    config: &Config,
    db: Option<&Path>,
    id: i64,
    changes: &TrackEdit,
) -> anyhow::Result<()> {
    rt.block_on(async {
        let store = open_store(config, db).await?;
        let mut track = fetch_track(&store, id).await?;

        if !apply_edit(&mut track, changes) {
            println!("Nothing to change.");
            return Ok(());
        }

        store.update_track(&track).await?;
        println!("{}", track_line(&track));
        Ok(())
    })
}

async fn fetch_track(store: &Store, id: i64) -> anyhow::Result<Track> {
    store
        .track(id)
        .await?
        .ok_or_else(|| Error::not_found(format!("track {id}")).into())
}

/// Apply the given changes; returns whether anything was set.
fn apply_edit(track: &mut Track, changes: &TrackEdit) -> bool {
    let mut changed = false;

    if let Some(title) = &changes.title {
        track.set_title(title);
        changed = true;
    }
    if let Some(artist) = &changes.artist {
        track.set_artist(artist);
        changed = true;
    }
    if let Some(album) = &changes.album {
        track.set_album(album);
        changed = true;
    }
    if let Some(genre) = &changes.genre {
        track.set_genre(genre);
        changed = true;
    }
    if let Some(n) = changes.track {
        track.track = n;
        changed = true;
    }
    if let Some(year) = changes.year {
        track.year = year;
        changed = true;
    }
    changed
}
