use bet_client::bet::BetReader;
use bet_client::client::{Client, ClientConfig};
use bet_client::connection::{ConnectionManager, Exchange};
use bet_client::frame::{self, Action, Message};
use bet_client::shutdown::{ExitPolicy, ShutdownCoordinator};
use bet_client::ClientError;
use crossbeam_channel::{bounded, Sender};
use std::io::{Cursor, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const THREE: &str = "Ana,Diaz,1,2000-01-01,10\nLeo,Paz,2,2000-01-02,20\nEva,Sol,3,2000-01-03,30\n";

/// In-process aggregator: accepts `conns` connections and hands each to `handler`.
/// Returns the listener afterwards so tests can check nothing else connected.
fn serve<F>(conns: usize, mut handler: F) -> (SocketAddr, JoinHandle<TcpListener>)
where
    F: FnMut(usize, TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        for i in 0..conns {
            let (stream, _) = listener.accept().unwrap();
            handler(i, stream);
        }
        listener
    });
    (addr, handle)
}

/// Read one request, record it, and answer with whatever `reply` returns.
fn answer(mut stream: TcpStream, log: &Mutex<Vec<Message>>, reply: impl FnOnce(&Message) -> Message) {
    let req = frame::decode(&mut stream).unwrap();
    let resp = reply(&req);
    log.lock().unwrap().push(req);
    frame::write_message(&mut stream, &resp).unwrap();
}

fn config(addr: SocketAddr, batch_size: usize) -> ClientConfig {
    ClientConfig {
        id: "7".into(),
        server_address: addr.to_string(),
        loop_period: Duration::ZERO,
        batch_size,
        max_winner_queries: None,
    }
}

fn assert_no_more_connections(listener: TcpListener) {
    listener.set_nonblocking(true).unwrap();
    let err = listener.accept().unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
}

#[test]
fn submits_batches_finishes_and_polls_winners() {
    let log: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    let server_log = log.clone();
    let (addr, server) = serve(5, move |i, stream| {
        answer(stream, &server_log, |req| match req.action {
            Action::Bet | Action::Finish => Message::new(Action::Ok, ""),
            Action::Winner if i == 3 => Message::new(Action::WinnerWait, "0"),
            _ => Message::new(Action::Winner, "7;42"),
        })
    });

    let client = Client::new(config(addr, 2), ShutdownCoordinator::new("7"));
    let outcome = client.run(&mut BetReader::new(Cursor::new(THREE))).unwrap();
    assert_no_more_connections(server.join().unwrap());

    assert_eq!(outcome.submission.batches, 2);
    assert_eq!(outcome.submission.bets, 3);
    assert_eq!(outcome.winners.count(), 2);
    assert_eq!(outcome.winners.queries, 2);

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            Message::new(Action::Bet, "7:Ana:Diaz:1:2000-01-01:10;7:Leo:Paz:2:2000-01-02:20"),
            Message::new(Action::Bet, "7:Eva:Sol:3:2000-01-03:30"),
            Message::new(Action::Finish, "7"),
            Message::new(Action::Winner, "7"),
            Message::new(Action::Winner, "7"),
        ]
    );
}

#[test]
fn reads_bets_from_csv_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(THREE.as_bytes()).unwrap();
    file.flush().unwrap();

    let log: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    let server_log = log.clone();
    let (addr, server) = serve(3, move |_, stream| {
        answer(stream, &server_log, |req| match req.action {
            Action::Winner => Message::new(Action::Winner, ""),
            _ => Message::new(Action::Ok, ""),
        })
    });

    let client = Client::new(config(addr, 10), ShutdownCoordinator::new("7"));
    let outcome = client.run(&mut BetReader::open(file.path()).unwrap()).unwrap();
    server.join().unwrap();

    assert_eq!(outcome.submission.batches, 1);
    assert_eq!(outcome.winners.count(), 0);
    assert_eq!(log.lock().unwrap()[0].payload.matches(';').count(), 2);
}

#[test]
fn connection_closed_mid_bet_stops_before_finish() {
    let (addr, server) = serve(1, |_, mut stream| {
        let mut len = [0u8; 4];
        stream.read_exact(&mut len).unwrap();
        drop(stream);
    });

    let client = Client::new(config(addr, 2), ShutdownCoordinator::new("7"));
    let err = client.run(&mut BetReader::new(Cursor::new(THREE))).unwrap_err();

    assert!(matches!(err, ClientError::Transport(_)), "{err}");
    assert_no_more_connections(server.join().unwrap());
}

#[test]
fn non_ok_acknowledgement_stops_submission() {
    let log: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    let server_log = log.clone();
    let (addr, server) = serve(1, move |_, stream| {
        answer(stream, &server_log, |_| Message::new(Action::Other("ERROR".into()), "storage"))
    });

    let client = Client::new(config(addr, 2), ShutdownCoordinator::new("7"));
    let err = client.run(&mut BetReader::new(Cursor::new(THREE))).unwrap_err();

    assert!(matches!(err, ClientError::BatchRejected { .. }), "{err}");
    assert_no_more_connections(server.join().unwrap());
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn unreachable_server_is_fatal() {
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let client = Client::new(config(addr, 2), ShutdownCoordinator::new("7"));
    let err = client.run(&mut BetReader::new(Cursor::new(THREE))).unwrap_err();

    assert!(matches!(err, ClientError::ConnectFailed { .. }), "{err}");
    assert!(err.is_fatal());
}

#[test]
fn shutdown_during_winner_query_abandons_poll() {
    let (winner_seen, winner_rx) = bounded::<()>(1);
    let (release, release_rx) = bounded::<()>(1);
    let log: Arc<Mutex<Vec<Message>>> = Arc::new(Mutex::new(Vec::new()));
    let server_log = log.clone();
    let notify: Sender<()> = winner_seen;
    let (addr, server) = serve(3, move |_, mut stream| {
        let req = frame::decode(&mut stream).unwrap();
        let is_winner = req.action == Action::Winner;
        server_log.lock().unwrap().push(req);
        if is_winner {
            notify.send(()).unwrap();
            // Hold the connection open without answering.
            let _ = release_rx.recv_timeout(Duration::from_secs(10));
        } else {
            frame::write_message(&mut stream, &Message::new(Action::Ok, "")).unwrap();
        }
    });

    let shutdown = ShutdownCoordinator::new("7");
    let coordinator = shutdown.spawn(ExitPolicy::Return).unwrap();
    let trigger = shutdown.trigger();
    std::thread::spawn(move || {
        winner_rx.recv().unwrap();
        trigger.fire();
    });

    let started = Instant::now();
    let client = Client::new(config(addr, 5), shutdown.clone());
    let err = client.run(&mut BetReader::new(Cursor::new(THREE))).unwrap_err();

    assert!(matches!(err, ClientError::Cancelled), "{err}");
    assert!(started.elapsed() < Duration::from_secs(5));
    coordinator.join().unwrap();
    assert!(shutdown.is_cancelled());

    release.send(()).unwrap();
    assert_no_more_connections(server.join().unwrap());
    let actions: Vec<Action> = log.lock().unwrap().iter().map(|m| m.action.clone()).collect();
    assert_eq!(actions, vec![Action::Bet, Action::Finish, Action::Winner]);
}

#[test]
fn exchanges_are_refused_after_shutdown() {
    let shutdown = ShutdownCoordinator::new("7");
    shutdown.shutdown();
    let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
    let mut conn = ConnectionManager::new(addr.to_string(), shutdown);
    let err = conn.send_and_receive(&Message::new(Action::Finish, "7")).unwrap_err();
    assert!(matches!(err, ClientError::Cancelled));
}
