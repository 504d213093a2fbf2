use std::fs;
use std::time::{Duration, SystemTime};

use amulet_engine::{backup_path, ensure_log_dir, refresh_backup};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[test]
fn backup_sits_next_to_the_log() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("amulets.json");
    assert_eq!(backup_path(&log), temp.path().join("amulets.json.bak"));
}

#[test]
fn no_backup_without_a_log() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("amulets.json");

    assert_eq!(refresh_backup(&log).unwrap(), None);
    assert!(!backup_path(&log).exists());
}

#[test]
fn backup_is_created_then_left_alone_while_fresh() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("amulets.json");
    fs::write(&log, "line one\n").unwrap();

    let made = refresh_backup(&log).unwrap();
    assert_eq!(made, Some(backup_path(&log)));
    assert_eq!(fs::read_to_string(backup_path(&log)).unwrap(), "line one\n");

    // Backup is at least as new as the log.
    assert_eq!(refresh_backup(&log).unwrap(), None);
}

#[test]
fn stale_backup_is_replaced() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("amulets.json");
    let bak = backup_path(&log);
    fs::write(&bak, "old\n").unwrap();
    fs::write(&log, "old\nnew\n").unwrap();

    let past = SystemTime::now() - Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(&bak)
        .unwrap()
        .set_modified(past)
        .unwrap();

    assert_eq!(refresh_backup(&log).unwrap(), Some(bak.clone()));
    assert_eq!(fs::read_to_string(&bak).unwrap(), "old\nnew\n");
}

#[test]
fn log_dir_is_created_on_demand() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("nested").join("deeper").join("amulets.json");

    ensure_log_dir(&log).unwrap();

    assert!(temp.path().join("nested").join("deeper").is_dir());
    assert!(!log.exists());
}

#[test]
fn log_dir_that_is_a_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("blocker");
    fs::write(&blocker, "").unwrap();

    assert!(ensure_log_dir(&blocker.join("amulets.json")).is_err());
}

#[test]
fn bare_file_name_needs_no_dir() {
    ensure_log_dir(std::path::Path::new("amulets.json")).unwrap();
}

#[test]
fn directory_log_cannot_be_backed_up() {
    let temp = TempDir::new().unwrap();
    assert!(refresh_backup(temp.path()).is_err());
}
