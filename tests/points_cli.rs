mod support;

use predicates::str::contains;
use serde_json::Value;

use support::TestEnv;

fn deltas(entries: &Value) -> Vec<i64> {
    entries
        .as_array()
        .expect("entries array")
        .iter()
        .map(|entry| entry["delta"].as_i64().unwrap_or_default())
        .collect()
}

#[test]
fn fresh_ledger_starts_at_level_one() {
    let env = TestEnv::new();

    let ledger = env.json(&["points", "show"]);
    assert_eq!(ledger["points"], 0);
    assert_eq!(ledger["stats"]["level"], 1);
    assert_eq!(ledger["stats"]["next_level_threshold"], 1000);
    assert_eq!(ledger["stats"]["streak_days"], 0);
    assert_eq!(ledger["stats"]["badges"].as_array().unwrap().len(), 5);
    assert!(!env.data_dir().join("ledger.json").exists());
}

#[test]
fn crossing_a_level_pays_the_bonus() {
    let env = TestEnv::new();

    let first = env.json(&["points", "add", "warm up", "950"]);
    assert_eq!(first["ledger"]["points"], 950);
    assert!(first.get("level_up").is_none());

    let second = env.json(&["points", "add", "push", "100"]);
    assert_eq!(deltas(&second["entries"]), vec![100, 200]);
    assert_eq!(second["entries"][1]["action"], "Level 2 bonus");
    assert_eq!(second["level_up"], 2);
    assert_eq!(second["ledger"]["points"], 1250);
    assert_eq!(second["ledger"]["stats"]["current_points"], 250);

    let stored = env.read_json("ledger.json");
    let history_sum: i64 = deltas(&stored["history"]).iter().sum();
    assert_eq!(stored["points"].as_i64(), Some(history_sum));
}

#[test]
fn negative_delta_is_accepted() {
    let env = TestEnv::new();
    env.json(&["points", "add", "bonus", "300"]);
    let update = env.json(&["points", "add", "penalty", "-120"]);
    assert_eq!(update["ledger"]["points"], 180);
}

#[test]
fn out_of_range_delta_is_rejected() {
    let env = TestEnv::new();
    env.json(&["points", "add", "seed", "500"]);

    env.ql()
        .args(["points", "add", "jackpot", "9223372036854775797"])
        .assert()
        .code(2)
        .stderr(contains("outside"));

    let ledger = env.json(&["points", "show"]);
    assert_eq!(ledger["points"], 500);
    assert_eq!(env.read_json("ledger.json")["history"].as_array().unwrap().len(), 1);
}

#[test]
fn completing_a_task_awards_points_and_badges() {
    let env = TestEnv::new();
    let id = env.add_task(&["Ship release", "--priority", "high"]);

    let done = env.json(&["task", "progress", &id, "100"]);
    assert_eq!(done["completed"], true);
    assert_eq!(done["task"]["status"], "Done");

    let rewards = &done["rewards"];
    // 150 for a high-priority completion, 100 first-task, 200 speed-runner
    assert_eq!(rewards["ledger"]["points"], 450);
    assert_eq!(rewards["entries"][0]["action"], "Completed: Ship release");
    let unlocked: Vec<&str> = rewards["unlocked"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|badge| badge["id"].as_str())
        .collect();
    assert_eq!(unlocked, vec!["first-task", "speed-runner"]);
    assert_eq!(rewards["ledger"]["stats"]["streak_days"], 1);
    assert_eq!(rewards["ledger"]["stats"]["completions"]["total"], 1);

    // Already done: no second award.
    let again = env.json(&["task", "progress", &id, "100"]);
    assert_eq!(again["completed"], false);
    assert!(again.get("rewards").is_none());
    assert_eq!(env.json(&["points", "show"])["points"], 450);
}

#[test]
fn completion_rewards_follow_config() {
    let env = TestEnv::new();
    env.write_config(
        r#"
[points]
completion_low = 5

[[points.badges]]
id = "starter"
name = "Starter"
reward = 1
rule = { kind = "total_completed", count = 2 }
"#,
    );
    let a = env.add_task(&["A"]);
    let b = env.add_task(&["B"]);

    let first = env.json(&["task", "progress", &a, "100"]);
    assert_eq!(first["rewards"]["ledger"]["points"], 5);

    let second = env.json(&["task", "progress", &b, "100"]);
    assert_eq!(second["rewards"]["unlocked"][0]["id"], "starter");
    assert_eq!(second["rewards"]["ledger"]["points"], 11);
}

#[test]
fn history_lists_newest_first() {
    let env = TestEnv::new();
    env.json(&["points", "add", "first", "1"]);
    env.json(&["points", "add", "second", "2"]);
    env.json(&["points", "add", "third", "3"]);

    let history = env.json(&["points", "history", "--limit", "2"]);
    assert_eq!(history["total"], 3);
    assert_eq!(deltas(&history["entries"]), vec![3, 2]);

    env.ql()
        .args(["points", "history"])
        .assert()
        .success()
        .stdout(contains("+3 third"));
}

#[test]
fn badges_and_checkin() {
    let env = TestEnv::new();

    env.ql()
        .args(["points", "badges"])
        .assert()
        .success()
        .stdout(contains("Earned: 0 / 5"))
        .stdout(contains("[ ] First Step"));

    let checkin = env.json(&["points", "checkin"]);
    assert_eq!(checkin["ledger"]["stats"]["streak_days"], 1);
    assert!(checkin["ledger"]["stats"]["last_activity_date"].is_string());

    // Same day again changes nothing.
    let again = env.json(&["points", "checkin"]);
    assert_eq!(again["entries"], serde_json::json!([]));
    assert_eq!(again["ledger"]["stats"]["streak_days"], 1);
}

#[test]
fn empty_action_is_rejected() {
    let env = TestEnv::new();
    env.ql()
        .args(["points", "add", " ", "10"])
        .assert()
        .code(2)
        .stderr(contains("action cannot be empty"));
}
