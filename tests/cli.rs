use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("tubescribe")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("transcript"))
        .stdout(predicate::str::contains("playlist"));
}

#[test]
fn test_transcript_requires_video_id() {
    Command::cargo_bin("tubescribe")
        .unwrap()
        .arg("transcript")
        .assert()
        .failure()
        .stderr(predicate::str::contains("VIDEO_ID"));
}

#[test]
fn test_rejects_unknown_format() {
    Command::cargo_bin("tubescribe")
        .unwrap()
        .args(["channel", "@mkbhd", "--format", "srt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
