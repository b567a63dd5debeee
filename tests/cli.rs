use assert_cmd::Command;
use codex::config::CodexConfig;
use codex::entry_type::{EntrySection, EntryType};
use codex::store::fs::FileStore;
use codex::store::KnowledgeStore;
use predicates::prelude::*;
use tempfile::TempDir;

fn setup() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CodexConfig::default();
    config.entry_type_list.push(
        EntryType::new("NPC")
            .with_id("npc")
            .with_section(EntrySection::new("Notes").with_id("s1").with_affixes("", "\n"))
            .with_section(EntrySection::new("Stats").with_id("s2")),
    );
    config.save(dir.path()).unwrap();

    let mut store = FileStore::new(dir.path().join("books"));
    store.create_book("World").unwrap();
    store
        .create_entry("World", &["Elaria".to_string()], "A port city")
        .unwrap();
    store
        .create_entry("World", &["Milo".to_string()], "A cook")
        .unwrap();
    dir
}

fn codex(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("codex").unwrap();
    cmd.env_remove("CODEX_LOG")
        .env("NO_COLOR", "1")
        .arg("--data-dir")
        .arg(dir.path());
    cmd
}

#[test]
fn lists_books_by_default() {
    let dir = setup();
    codex(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("World"))
        .stdout(predicate::str::contains("2 entries"));
}

#[test]
fn data_dir_comes_from_the_environment() {
    let dir = setup();
    Command::cargo_bin("codex")
        .unwrap()
        .env("CODEX_HOME", dir.path())
        .arg("books")
        .assert()
        .success()
        .stdout(predicate::str::contains("World"));
}

#[test]
fn match_lists_entries_and_their_content() {
    let dir = setup();
    codex(&dir)
        .args(["match", "Milo", "sails", "to", "Elaria"])
        .assert()
        .success()
        .stdout(predicate::str::contains("World#0"))
        .stdout(predicate::str::contains("World#1"));

    codex(&dir)
        .args(["match", "--content", "Milo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"A cook\""));
}

#[test]
fn link_reads_stdin_and_restore_undoes_it() {
    let dir = setup();
    let output = codex(&dir)
        .arg("link")
        .write_stdin("<p>Milo sails to Elaria.</p>")
        .assert()
        .success()
        .stdout(predicate::str::contains("data-stcdx--uid=\"1\">Milo</span>"))
        .get_output()
        .stdout
        .clone();

    codex(&dir)
        .arg("restore")
        .write_stdin(output)
        .assert()
        .success()
        .stdout(predicate::eq("<p>Milo sails to Elaria.</p>"));
}

#[test]
fn typed_edits_show_up_in_the_panel() {
    let dir = setup();
    codex(&dir)
        .args(["set-type", "World#1", "NPC"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved Milo"));
    codex(&dir)
        .args(["edit", "World#1", "--section", "Stats", "--content", "STR 3"])
        .assert()
        .success();
    codex(&dir)
        .args(["show", "World#1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("STR 3"))
        .stdout(predicate::str::contains("{{//codex:").not());
}

#[test]
fn section_wi_toggles_and_applies() {
    let dir = setup();
    codex(&dir)
        .args(["types", "section-wi", "--type", "NPC", "--section", "Stats", "false"])
        .assert()
        .success();
    codex(&dir)
        .args(["types", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("⊘ Stats"));
    codex(&dir)
        .args(["types", "apply", "NPC"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NPC: 2 scanned, 0 matched, 0 saved"));
}

#[test]
fn config_round_trips_and_rejects_unknown_types() {
    let dir = setup();
    codex(&dir)
        .args(["config", "onlyFirst", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("onlyFirst set to true"));
    codex(&dir)
        .args(["config", "onlyFirst"])
        .assert()
        .success()
        .stdout(predicate::str::contains("true"));

    codex(&dir)
        .args(["types", "apply", "Monster"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Entry type not found: Monster"));
}
