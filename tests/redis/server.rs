use std::{io::Write, time::Duration};

use aof_redis::{resp::RespValue, server::RedisServer};
use tokio::{net::TcpListener, time::timeout};

use crate::test_utils::{TestServer, TestUtils};

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TestUtils::temp_dir();

    let server = TestServer::start(dir.path()).await;
    let mut client = server.connect().await;
    assert_eq!(
        client.send_and_receive(&TestUtils::set_command("a", "1")).await,
        TestUtils::ok()
    );
    assert_eq!(
        client
            .send_and_receive(&TestUtils::hset_command("h", "f", "v"))
            .await,
        TestUtils::ok()
    );
    assert_eq!(
        client
            .send_and_receive(&TestUtils::publish_command("ch", "not persisted"))
            .await,
        RespValue::Integer(0)
    );
    drop(client);
    server.stop().await;

    assert_eq!(
        TestUtils::read_log(&TestUtils::aof_path(dir.path())),
        vec![
            TestUtils::set_command("a", "1"),
            TestUtils::hset_command("h", "f", "v"),
        ]
    );

    let server = TestServer::start(dir.path()).await;
    let mut client = server.connect().await;
    assert_eq!(
        client.send_and_receive(&TestUtils::get_command("a")).await,
        TestUtils::bulk("1")
    );
    assert_eq!(
        client.send_and_receive(&TestUtils::hget_command("h", "f")).await,
        TestUtils::bulk("v")
    );
    assert_eq!(
        client.send_and_receive(&TestUtils::keys_command()).await,
        RespValue::Array(vec![TestUtils::bulk("a")])
    );
    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_unknown_logged_commands_are_skipped() {
    let dir = TestUtils::temp_dir();

    {
        let mut file = std::fs::File::create(TestUtils::aof_path(dir.path())).unwrap();
        for command in [
            TestUtils::set_command("a", "1"),
            TestUtils::command(&["LPUSH", "list", "x"]),
            TestUtils::command(&["SET", "too", "many", "args"]),
            TestUtils::set_command("b", "2"),
        ] {
            file.write_all(&command.encode()).unwrap();
        }
    }

    let server = TestServer::start(dir.path()).await;
    let mut client = server.connect().await;

    assert_eq!(
        client.send_and_receive(&TestUtils::keys_command()).await,
        RespValue::Array(vec![TestUtils::bulk("a"), TestUtils::bulk("b")])
    );
    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn test_corrupt_log_aborts_startup() {
    let dir = TestUtils::temp_dir();

    {
        let mut file = std::fs::File::create(TestUtils::aof_path(dir.path())).unwrap();
        file.write_all(&TestUtils::set_command("a", "1").encode())
            .unwrap();
        file.write_all(b"garbage\r\n").unwrap();
        file.write_all(&TestUtils::set_command("b", "2").encode())
            .unwrap();
    }

    let server = RedisServer::new(vec![
        "aof-redis".to_string(),
        "--dir".to_string(),
        dir.path().display().to_string(),
    ])
    .unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    let result = timeout(
        Duration::from_secs(2),
        server.serve(listener, std::future::pending()),
    )
    .await
    .expect("startup should fail instead of serving");

    let error = result.unwrap_err();
    assert!(
        format!("{:#}", error).contains("corrupt"),
        "unexpected error: {:#}",
        error
    );
}

#[tokio::test]
async fn test_log_directory_is_created() {
    let dir = TestUtils::temp_dir();
    let nested = dir.path().join("nested").join("data");

    let server = TestServer::start(&nested).await;
    let mut client = server.connect().await;
    assert_eq!(
        client.send_and_receive(&TestUtils::set_command("k", "v")).await,
        TestUtils::ok()
    );
    drop(client);
    server.stop().await;

    assert_eq!(
        TestUtils::read_log(&TestUtils::aof_path(&nested)),
        vec![TestUtils::set_command("k", "v")]
    );
}
