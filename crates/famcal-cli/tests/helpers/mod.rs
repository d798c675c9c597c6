#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

/// Runs the binary against a throwaway database in its own directory.
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// Command configured for testing. The working directory is the temp dir so
    /// no stray `famcal.toml` is picked up.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("famcal").expect("Failed to find famcal binary");
        cmd.current_dir(self.temp_dir.path())
            .env("FAMCAL_DATABASE_PATH", &self.db_path)
            .env_remove("FAMCAL_DEFAULT_FAMILY")
            .env_remove("FAMCAL_DEFAULT_MEMBER")
            .env("RUST_LOG", "warn");
        cmd
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    pub fn stdout(&self, args: &[&str]) -> String {
        let output = self.run_success(args).get_output().stdout.clone();
        String::from_utf8(output).expect("stdout is utf-8")
    }

    /// Adds a member to a new family and returns `(member_id, family_id)`.
    pub fn add_member(&self, name: &str) -> (Uuid, Uuid) {
        let out = self.stdout(&["member", "add", name]);
        (labelled_id(&out, "id:"), labelled_id(&out, "family:"))
    }

    pub fn join_family(&self, name: &str, family: Uuid) -> Uuid {
        let family = family.to_string();
        let out = self.stdout(&["member", "add", name, "--family", &family]);
        labelled_id(&out, "id:")
    }

    /// Creates an event and returns its id.
    pub fn add_event(&self, family: Uuid, member: Uuid, args: &[&str]) -> Uuid {
        let family = family.to_string();
        let member = member.to_string();
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        full.extend_from_slice(&["--family", &family, "--member", &member]);
        labelled_id(&self.stdout(&full), "id:")
    }

    /// Entries of `list --json` for the given range.
    pub fn list_json(&self, family: Uuid, from: &str, to: &str) -> Vec<Value> {
        let family = family.to_string();
        let out = self.stdout(&["list", "--family", &family, "--from", from, "--to", to, "--json"]);
        match serde_json::from_str(&out).expect("list prints JSON") {
            Value::Array(entries) => entries,
            other => panic!("expected a JSON array, got {}", other),
        }
    }
}

/// Uuid printed on the line that starts with `label`.
pub fn labelled_id(stdout: &str, label: &str) -> Uuid {
    stdout
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix(label))
        .and_then(|rest| Uuid::parse_str(rest.trim()).ok())
        .unwrap_or_else(|| panic!("no '{}' line in output:\n{}", label, stdout))
}

pub fn dates(entries: &[Value]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry["occurrence_date"].as_str().unwrap_or_default().to_string())
        .collect()
}

pub fn entry_on<'a>(entries: &'a [Value], date: &str) -> &'a Value {
    entries
        .iter()
        .find(|entry| entry["occurrence_date"] == date)
        .unwrap_or_else(|| panic!("no entry on {}", date))
}

/// Weekly Monday swim lesson through 2024.
pub const WEEKLY_SWIM: &[&str] = &[
    "Swim",
    "--at",
    "2024-01-01 09:00",
    "--end",
    "2024-01-01 10:00",
    "--every",
    "weekly",
    "--until",
    "2024-12-31",
];
