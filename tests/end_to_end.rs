//! End-to-end tests against a real listener on an ephemeral port.
//!
//! Each test plays the extension side with a tokio-tungstenite client.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use webnowplaying::protocol::{ParsedMessage, decode_frames};
use webnowplaying::{
    Error, EventResult, PlaybackState, PlayerEvent, PlayerId, PlayerSnapshot, Server,
};

// ============================================================================
// Helpers
// ============================================================================

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const VERSION: &str = "1.0.0";
const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn start_server(covers: &TempDir) -> Result<(Server, u16)> {
    init_tracing();
    let server = Server::builder().cover_dir(covers.path()).build()?;
    let port = server.start(0, VERSION).await?;
    Ok((server, port))
}

async fn connect(port: u16) -> Result<Client> {
    let (client, _) = connect_async(format!("ws://127.0.0.1:{port}")).await?;
    Ok(client)
}

/// Reads the next text message, skipping control frames.
async fn next_text(client: &mut Client) -> Result<String> {
    loop {
        let message = timeout(WAIT, client.next())
            .await
            .context("timed out waiting for a frame")?
            .context("stream ended")??;
        match message {
            Message::Text(text) => return Ok(text.to_string()),
            Message::Close(frame) => bail!("closed: {frame:?}"),
            _ => continue,
        }
    }
}

/// Waits until the server closes the connection.
async fn expect_close(client: &mut Client) -> Result<()> {
    loop {
        match timeout(WAIT, client.next()).await.context("no close")? {
            None | Some(Ok(Message::Close(_))) | Some(Err(_)) => return Ok(()),
            Some(Ok(_)) => continue,
        }
    }
}

async fn send(client: &mut Client, text: &str) -> Result<()> {
    client.send(Message::Text(text.to_string().into())).await?;
    Ok(())
}

/// Reads the greeting and checks the announced version.
async fn read_greeting(client: &mut Client) -> Result<()> {
    let greeting = next_text(client).await?;
    let first = decode_frames(&greeting).next().context("empty greeting")??;
    match first {
        ParsedMessage::Hello { adapter_version } => assert_eq!(adapter_version, VERSION),
        other => bail!("unexpected greeting frame: {other:?}"),
    }
    assert!(greeting.contains("PROTOCOL_REVISION"));
    Ok(())
}

/// Connects and completes the handshake.
async fn handshake(port: u16) -> Result<Client> {
    let mut client = connect(port).await?;
    read_greeting(&mut client).await?;
    send(&mut client, &format!("ADAPTER_VERSION {VERSION}")).await?;
    Ok(client)
}

/// A tiny PNG image.
fn png_bytes() -> Result<Vec<u8>> {
    let image = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}

fn cover_path(covers: &TempDir, id: PlayerId) -> PathBuf {
    covers.path().join(format!("wnp-cover-{id}.png"))
}

/// Polls until `check` accepts a snapshot.
async fn wait_for(
    server: &Server,
    check: impl Fn(&[PlayerSnapshot]) -> bool,
) -> Result<Vec<PlayerSnapshot>> {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let players = server.all_players();
        if check(&players) {
            return Ok(players);
        }
        if tokio::time::Instant::now() > deadline {
            bail!("condition not met, players: {players:?}");
        }
        sleep(Duration::from_millis(10)).await;
    }
}

fn only_player(players: &[PlayerSnapshot]) -> PlayerId {
    players[0].id
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_handshake_and_field_updates() -> Result<()> {
    let covers = TempDir::new()?;
    let (server, port) = start_server(&covers).await?;

    let mut client = handshake(port).await?;
    send(&mut client, "NAME YouTube\nTITLE \"Song A\"\nARTIST Someone").await?;
    send(&mut client, "STATE PLAYING\nDURATION 200\nPOSITION 20").await?;

    wait_for(&server, |p| p.len() == 1 && p[0].state == PlaybackState::Playing).await?;

    let active = server.active_player(false)?;
    assert_eq!(active.name, "YouTube");
    assert_eq!(active.title, "Song A");
    assert_eq!(active.artist, "Someone");
    assert_eq!(active.duration, 200.0);
    assert_eq!(active.position, 20.0);

    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_version_mismatch_is_rejected() -> Result<()> {
    let covers = TempDir::new()?;
    let (server, port) = start_server(&covers).await?;

    let mut client = connect(port).await?;
    read_greeting(&mut client).await?;
    send(&mut client, "ADAPTER_VERSION 2.0.0").await?;

    expect_close(&mut client).await?;
    assert_eq!(server.player_count(), 0);

    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_disconnect_unregisters_player() -> Result<()> {
    let covers = TempDir::new()?;
    let (server, port) = start_server(&covers).await?;

    let mut client = handshake(port).await?;
    send(&mut client, "TITLE x").await?;
    wait_for(&server, |p| p.len() == 1).await?;

    client.close(None).await?;
    wait_for(&server, |p| p.is_empty()).await?;

    let err = server.active_player(false).unwrap_err();
    assert!(matches!(err, Error::NoSuchPlayer { .. }));
    assert!(server.active_player(true)?.is_placeholder());

    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_command_reaches_extension_and_settles() -> Result<()> {
    let covers = TempDir::new()?;
    let (server, port) = start_server(&covers).await?;

    let mut client = handshake(port).await?;
    send(&mut client, "CAN_SET_VOLUME 1\nVOLUME 10").await?;
    let players = wait_for(&server, |p| p.len() == 1 && p[0].capabilities.can_set_volume).await?;
    let id = only_player(&players);

    let event_id = server.try_set_volume(id, 40.0)?;
    assert_eq!(server.event_result(event_id), Some(EventResult::Pending));

    let frame = next_text(&mut client).await?;
    assert_eq!(frame, format!("SET_VOLUME {event_id} 40"));

    send(&mut client, &format!("EVENT_RESULT {event_id} SUCCEEDED\nVOLUME 40")).await?;
    assert_eq!(
        server.wait_for_event_result(event_id).await,
        EventResult::Succeeded
    );
    wait_for(&server, |p| p.len() == 1 && p[0].volume == 40.0).await?;

    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_unsupported_command_writes_nothing() -> Result<()> {
    let covers = TempDir::new()?;
    let (server, port) = start_server(&covers).await?;

    let mut client = handshake(port).await?;
    send(&mut client, "TITLE x").await?;
    let players = wait_for(&server, |p| p.len() == 1).await?;
    let id = only_player(&players);

    let err = server.try_skip_next(id).unwrap_err();
    assert!(matches!(err, Error::Unsupported { .. }));

    let nothing = timeout(Duration::from_millis(200), client.next()).await;
    assert!(nothing.is_err(), "no frame expected");

    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_silent_player_is_evicted() -> Result<()> {
    init_tracing();
    let covers = TempDir::new()?;
    let server = Server::builder()
        .cover_dir(covers.path())
        .liveness_timeout(Duration::from_millis(300))
        .sweep_interval(Duration::from_millis(50))
        .build()?;
    let port = server.start(0, VERSION).await?;

    let mut client = handshake(port).await?;
    send(&mut client, "TITLE quiet").await?;
    wait_for(&server, |p| p.len() == 1).await?;

    expect_close(&mut client).await?;
    wait_for(&server, |p| p.is_empty()).await?;

    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_stop_closes_clients() -> Result<()> {
    let covers = TempDir::new()?;
    let (server, port) = start_server(&covers).await?;

    let mut first = handshake(port).await?;
    let mut second = handshake(port).await?;
    send(&mut first, "TITLE one").await?;
    send(&mut second, "TITLE two").await?;
    wait_for(&server, |p| p.len() == 2).await?;

    server.stop().await;

    expect_close(&mut first).await?;
    expect_close(&mut second).await?;
    assert_eq!(server.player_count(), 0);
    assert!(!server.is_started());
    Ok(())
}

#[tokio::test]
async fn test_events_follow_player_lifecycle() -> Result<()> {
    let covers = TempDir::new()?;
    let (server, port) = start_server(&covers).await?;

    let events: Arc<Mutex<Vec<PlayerEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    server.set_event_handler(move |event| sink.lock().push(event));

    let mut client = handshake(port).await?;
    send(&mut client, "TITLE tracked\nSTATE PLAYING").await?;
    wait_for(&server, |p| p.len() == 1 && p[0].state == PlaybackState::Playing).await?;
    client.close(None).await?;
    wait_for(&server, |p| p.is_empty()).await?;

    let events = events.lock();
    assert!(matches!(events.first(), Some(PlayerEvent::Added(_))));
    assert!(events.iter().any(|e| matches!(e, PlayerEvent::Updated(s) if s.title == "tracked")));
    assert!(events.iter().any(|e| matches!(e, PlayerEvent::Removed(_))));
    drop(events);

    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_malformed_frames_past_threshold_close_session() -> Result<()> {
    init_tracing();
    let covers = TempDir::new()?;
    let server = Server::builder()
        .cover_dir(covers.path())
        .max_decode_errors(2)
        .build()?;
    let port = server.start(0, VERSION).await?;

    let mut client = handshake(port).await?;
    send(&mut client, "TITLE fine").await?;
    wait_for(&server, |p| p.len() == 1 && p[0].title == "fine").await?;

    // two are tolerated, the third closes
    send(&mut client, "VOLUME x\nVOLUME y").await?;
    sleep(Duration::from_millis(100)).await;
    assert_eq!(server.player_count(), 1);

    send(&mut client, "VOLUME z").await?;
    expect_close(&mut client).await?;
    wait_for(&server, |p| p.is_empty()).await?;

    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_binary_cover_stored_and_removed() -> Result<()> {
    let covers = TempDir::new()?;
    let (server, port) = start_server(&covers).await?;

    let mut client = handshake(port).await?;
    send(&mut client, "COVER_SRC https://example.com/art.jpg").await?;
    client.send(Message::Binary(png_bytes()?.into())).await?;

    let players = wait_for(&server, |p| p.len() == 1 && p[0].cover.starts_with("file://")).await?;
    let id = only_player(&players);
    assert_eq!(players[0].cover_src, "https://example.com/art.jpg");
    assert!(cover_path(&covers, id).exists());

    client.close(None).await?;
    wait_for(&server, |p| p.is_empty()).await?;

    // removed right after the player leaves the registry
    let path = cover_path(&covers, id);
    let deadline = tokio::time::Instant::now() + WAIT;
    while path.exists() {
        if tokio::time::Instant::now() > deadline {
            bail!("cover {} still on disk", path.display());
        }
        sleep(Duration::from_millis(10)).await;
    }

    server.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_cover_sent_before_handshake_is_kept() -> Result<()> {
    let covers = TempDir::new()?;
    let (server, port) = start_server(&covers).await?;

    let mut client = connect(port).await?;
    read_greeting(&mut client).await?;
    client.send(Message::Binary(png_bytes()?.into())).await?;
    send(&mut client, &format!("ADAPTER_VERSION {VERSION}")).await?;

    let players = wait_for(&server, |p| p.len() == 1 && p[0].cover.starts_with("file://")).await?;
    assert!(cover_path(&covers, only_player(&players)).exists());

    server.stop().await;
    Ok(())
}
