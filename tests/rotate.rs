//! Rotation of finished logs and shard discovery on real files

mod helper;

use std::fs;

use tempfile::TempDir;

use helper::file_names;
use npm_dep_events::config::RotationConfig;
use npm_dep_events::events::record::EventRecord;
use npm_dep_events::events::rotate::{InProcessRotator, LogRotator};
use npm_dep_events::events::shards::{
    active_log_path, last_event_date, latest_shard, next_log_number,
};

fn write_log(path: &std::path::Path, days: &[u32]) {
    let content: String = days
        .iter()
        .enumerate()
        .map(|(i, day)| format!("pkg{i},1.0.{i},2021-01-{day:02}T00:00:00.000Z,add,prod,dep{i}\n"))
        .collect();
    fs::write(path, content).unwrap();
}

#[test]
fn split_shards_continue_numbering_for_the_next_run() {
    let dir = TempDir::new().unwrap();
    let rotator = InProcessRotator::new(&RotationConfig {
        size_threshold_bytes: 64,
        shard_lines: 3,
        sort_chunk_lines: 2,
    });

    let active = active_log_path(dir.path(), next_log_number(dir.path()).unwrap());
    write_log(&active, &[9, 3, 7, 1, 5, 8, 2]);
    let shards = rotator.rotate(&active).unwrap();

    assert_eq!(shards.len(), 3);
    assert_eq!(
        file_names(dir.path()),
        vec![
            "sorted_dependency_events_0.csv",
            "sorted_dependency_events_1.csv",
            "sorted_dependency_events_2.csv"
        ]
    );
    assert_eq!(latest_shard(dir.path()).unwrap(), Some(2));
    assert_eq!(next_log_number(dir.path()).unwrap(), 3);
    assert_eq!(
        last_event_date(dir.path()).unwrap(),
        Some("2021-01-09T00:00:00.000Z".to_string())
    );

    let dates: Vec<String> = shards
        .iter()
        .flat_map(|shard| {
            fs::read_to_string(shard)
                .unwrap()
                .lines()
                .map(|line| EventRecord::parse(line).unwrap().date)
                .collect::<Vec<_>>()
        })
        .collect();
    let mut sorted = dates.clone();
    sorted.sort();
    assert_eq!(dates, sorted);
    assert_eq!(dates.len(), 7);
}

#[test]
fn second_rotation_lands_after_existing_shards() {
    let dir = TempDir::new().unwrap();
    let rotator = InProcessRotator::new(&RotationConfig::default());

    let first = active_log_path(dir.path(), next_log_number(dir.path()).unwrap());
    write_log(&first, &[2, 1]);
    rotator.rotate(&first).unwrap();

    let second = active_log_path(dir.path(), next_log_number(dir.path()).unwrap());
    write_log(&second, &[4, 3]);
    let shards = rotator.rotate(&second).unwrap();

    assert_eq!(shards, vec![dir.path().join("sorted_dependency_events_1.csv")]);
    assert_eq!(
        last_event_date(dir.path()).unwrap(),
        Some("2021-01-04T00:00:00.000Z".to_string())
    );
}
