mod support;

use predicates::str::contains;
use serde_json::Value;

use support::TestEnv;

fn messages(data: &Value) -> Vec<String> {
    data["notifications"]
        .as_array()
        .expect("notifications array")
        .iter()
        .map(|note| note["message"].as_str().unwrap_or_default().to_string())
        .collect()
}

fn seed(env: &TestEnv) {
    env.add_task(&["Overdue", "--deadline", "2026-10-17"]);
    env.add_task(&["Today", "--priority", "high", "--deadline", "2026-10-18"]);
    let done = env.add_task(&["Finished", "--deadline", "2026-10-19"]);
    env.json(&["task", "progress", &done, "100"]);
    env.add_task(&["Tomorrow", "--deadline", "2026-10-19"]);
    env.add_task(&["Soon", "--priority", "medium", "--deadline", "2026-10-20"]);
    env.add_task(&["Later", "--deadline", "2026-10-22"]);
    env.add_task(&["Someday"]);
}

#[test]
fn reminders_cover_the_next_three_days() {
    let env = TestEnv::new();
    seed(&env);

    let data = env.json(&["notify", "--today", "2026-10-18"]);
    assert_eq!(data["today"], "2026-10-18");
    assert_eq!(data["window_days"], 3);
    assert_eq!(
        messages(&data),
        vec![
            "\"Today\" is due today",
            "\"Tomorrow\" is due tomorrow",
            "\"Soon\" is due in 2 days",
        ]
    );
    assert_eq!(data["notifications"][0]["title"], "High Priority Task");
    assert_eq!(data["notifications"][2]["title"], "Medium Priority Task");
    assert_eq!(data["notifications"][0]["kind"], "deadline");
}

#[test]
fn window_comes_from_config() {
    let env = TestEnv::new();
    env.write_config("[notifier]\nwindow_days = 4\n");
    seed(&env);

    let data = env.json(&["notify", "--today", "2026-10-18"]);
    assert_eq!(data["total"], 4);
    assert_eq!(messages(&data)[3], "\"Later\" is due in 4 days");
}

#[test]
fn human_output_lists_reminders() {
    let env = TestEnv::new();
    seed(&env);

    env.ql()
        .args(["notify", "--today", "2026-10-18"])
        .assert()
        .success()
        .stdout(contains("3 upcoming deadlines"))
        .stdout(contains("[Low Priority Task] \"Tomorrow\" is due tomorrow"));

    env.ql()
        .args(["notify", "--today", "2027-01-01"])
        .assert()
        .success()
        .stdout(contains("No upcoming deadlines"));
}

#[test]
fn invalid_date_is_user_error() {
    let env = TestEnv::new();
    env.ql()
        .args(["notify", "--today", "tomorrow"])
        .assert()
        .code(2)
        .stderr(contains("--today"));
}
