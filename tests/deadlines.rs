use memnet::{listen, NetError};
use std::thread;
use std::time::{Duration, Instant};

fn connected_pair(address: &str) -> (memnet::Connection, memnet::Connection) {
  let listener = listen(1, 0, address).unwrap();
  let acceptor = listener.clone();
  let accepted = thread::spawn(move || acceptor.accept().unwrap());
  let dialed = listener.dial().unwrap();
  (dialed, accepted.join().unwrap())
}

#[test]
fn read_deadline_expires_while_peer_stays_silent() {
  let (local, _remote) = connected_pair("deadlines:1");

  local.set_read_deadline(Some(Instant::now() + Duration::from_millis(25))).unwrap();
  let mut buf = [0u8; 8];
  let started = Instant::now();
  assert!(matches!(local.read(&mut buf), Err(NetError::DeadlineExceeded)));
  assert!(started.elapsed() >= Duration::from_millis(20));
}

#[test]
fn write_deadline_expires_once_ring_fills_up() {
  let listener = listen(1, 0, "deadlines:2").unwrap();
  let acceptor = listener.clone();
  let accepted = thread::spawn(move || acceptor.accept().unwrap());
  let local = listener.dial().unwrap();
  let _remote = accepted.join().unwrap();

  local.set_write_deadline(Some(Instant::now() + Duration::from_millis(25))).unwrap();

  // Nobody ever reads, so eventually the ring fills and the deadline fires.
  let mut total_written = 0usize;
  let result = loop {
    match local.write(&[0u8; 256]) {
      Ok(n) => total_written += n,
      Err(err) => break err,
    }
  };

  assert!(matches!(result, NetError::DeadlineExceeded));
  assert!(total_written > 0);
}

#[test]
fn clearing_a_deadline_lets_a_later_read_block_indefinitely_until_data_arrives() {
  let (local, remote) = connected_pair("deadlines:3");

  local.set_read_deadline(Some(Instant::now() + Duration::from_millis(1))).unwrap();
  let mut buf = [0u8; 4];
  assert!(matches!(local.read(&mut buf), Err(NetError::DeadlineExceeded)));

  local.set_read_deadline(None).unwrap();
  let writer = thread::spawn(move || {
    thread::sleep(Duration::from_millis(50));
    remote.write(b"late").unwrap();
  });

  assert_eq!(local.read(&mut buf).unwrap(), 4);
  assert_eq!(&buf, b"late");
  writer.join().unwrap();
}
