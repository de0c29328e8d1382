use std::{io::Write, sync::Arc, time::Duration};

use aof_redis::{
    aof::{AppendOnlyFile, CommandLog, spawn_flush_task},
    commands::CommandRegistry,
    key_value_store::KeyValueStore,
    resp::RespValue,
};

use crate::test_utils::{RecordingLog, TestEnv, TestUtils};

async fn replay_into_new_store(log: &AppendOnlyFile) -> KeyValueStore {
    let registry = CommandRegistry::default();
    let mut store = KeyValueStore::new();

    log.replay(|command| {
        registry.replay(&mut store, &command).unwrap();
    })
    .await
    .unwrap();

    store
}

#[tokio::test]
async fn test_replay_reconstructs_store() {
    let dir = TestUtils::temp_dir();
    let log = TestUtils::open_log(dir.path()).await;
    let env = TestEnv::with_log(log.clone());

    let commands = vec![
        TestUtils::set_command("a", "1"),
        TestUtils::hset_command("h", "f", "v"),
        TestUtils::get_command("a"),
        TestUtils::set_command("a", "2"),
        TestUtils::command(&["SET", "broken"]),
        TestUtils::hset_command("h", "g", "w"),
        TestUtils::set_command("b", "\r\n$-1\r\n"),
        TestUtils::hset_command("h", "f", "v2"),
    ];

    for command in commands {
        env.exec(command).await;
    }

    let reopened = TestUtils::open_log(dir.path()).await;
    let replayed = replay_into_new_store(&reopened).await;

    assert_eq!(replayed, *env.get_store().await);
    assert_eq!(replayed.get(b"b").map(|v| v.as_ref()), Some(&b"\r\n$-1\r\n"[..]));
}

#[tokio::test]
async fn test_log_records_only_successful_mutations() {
    let dir = TestUtils::temp_dir();
    let log = TestUtils::open_log(dir.path()).await;
    let env = TestEnv::with_log(log.clone());

    env.exec(TestUtils::set_command("a", "1")).await;
    env.exec(TestUtils::get_command("a")).await;
    env.exec(TestUtils::command(&["HSET", "h"])).await;
    env.exec(TestUtils::command(&["UNKNOWN", "x"])).await;
    env.exec(TestUtils::hset_command("h", "f", "v")).await;

    assert_eq!(
        TestUtils::read_log(log.path()),
        vec![
            TestUtils::set_command("a", "1"),
            TestUtils::hset_command("h", "f", "v"),
        ]
    );
}

#[tokio::test]
async fn test_flushed_commands_survive_reopen() {
    let dir = TestUtils::temp_dir();

    {
        let log = TestUtils::open_log(dir.path()).await;
        log.append(&TestUtils::set_command("k", "v")).await.unwrap();
        log.append(&TestUtils::hset_command("h", "f", "v")).await.unwrap();
        log.flush().await.unwrap();
    }

    assert_eq!(
        TestUtils::read_log(&TestUtils::aof_path(dir.path())),
        vec![
            TestUtils::set_command("k", "v"),
            TestUtils::hset_command("h", "f", "v"),
        ]
    );

    let reopened = TestUtils::open_log(dir.path()).await;
    let store = replay_into_new_store(&reopened).await;
    assert_eq!(store.get(b"k").map(|v| v.as_ref()), Some(&b"v"[..]));
    assert_eq!(store.hget(b"h", b"f").map(|v| v.as_ref()), Some(&b"v"[..]));
}

#[tokio::test]
async fn test_appends_after_replay_of_torn_log() {
    let dir = TestUtils::temp_dir();
    let path = TestUtils::aof_path(dir.path());

    {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&TestUtils::set_command("a", "1").encode())
            .unwrap();
        // A crash in the middle of the second record.
        file.write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nb").unwrap();
    }

    let log = Arc::new(AppendOnlyFile::open(&path).await.unwrap());
    let store = replay_into_new_store(&log).await;
    assert_eq!(store.len(), 1);

    log.append(&TestUtils::set_command("c", "3")).await.unwrap();

    assert_eq!(
        TestUtils::read_log(&path),
        vec![
            TestUtils::set_command("a", "1"),
            TestUtils::set_command("c", "3"),
        ]
    );
}

#[tokio::test]
async fn test_flush_task_flushes_periodically() {
    let log = Arc::new(RecordingLog::failing_on(&[]));
    let handle = spawn_flush_task(log.clone(), Duration::from_millis(10));

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.abort();

    assert!(log.flushes() >= 2, "only {} flushes", log.flushes());
}

#[tokio::test]
async fn test_replayed_values_are_bulk_strings() {
    let dir = TestUtils::temp_dir();
    let log = TestUtils::open_log(dir.path()).await;
    log.append(&TestUtils::set_command("a", "1")).await.unwrap();

    let mut seen = Vec::new();
    let count = log.replay(|command| seen.push(command)).await.unwrap();

    assert_eq!(count, 1);
    assert_eq!(
        seen,
        vec![RespValue::Array(vec![
            RespValue::bulk("SET"),
            RespValue::bulk("a"),
            RespValue::bulk("1"),
        ])]
    );
}
