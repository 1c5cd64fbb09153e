use memnet::{listen, ListenerBuilder, NetError};
use std::thread;
use std::time::Duration;

#[test]
fn accept_backlog_enforces_capacity_and_fifo_order() {
  let listener = ListenerBuilder::new("lifecycle:1").capacity(2).accept_timeout_ms(200).build().unwrap();

  let first = listener.dial().unwrap();
  let second = listener.dial().unwrap();

  // Capacity is 2 and both slots are taken; a third dial must block until one
  // of the two pending connections is accepted.
  let l2 = listener.clone();
  let third_dial = thread::spawn(move || l2.dial());
  thread::sleep(Duration::from_millis(30));
  assert!(!third_dial.is_finished());

  first.write(b"A").unwrap();
  second.write(b"B").unwrap();

  let accepted_first = listener.accept().unwrap();
  let mut tag = [0u8; 1];
  accepted_first.read(&mut tag).unwrap();
  assert_eq!(tag[0], b'A');

  // Freeing a slot lets the blocked dial through.
  let third = third_dial.join().unwrap().unwrap();
  third.write(b"C").unwrap();

  let accepted_second = listener.accept().unwrap();
  accepted_second.read(&mut tag).unwrap();
  assert_eq!(tag[0], b'B');

  let accepted_third = listener.accept().unwrap();
  accepted_third.read(&mut tag).unwrap();
  assert_eq!(tag[0], b'C');
}

#[test]
fn close_wakes_blocked_dial_and_accept() {
  let listener = listen(1, 0, "lifecycle:2").unwrap();
  let _first = listener.dial().unwrap();

  let l_dial = listener.clone();
  let blocked_dial = thread::spawn(move || l_dial.dial());

  let l_accept = listen(1, 0, "lifecycle:3").unwrap();
  let l_accept_clone = l_accept.clone();
  let blocked_accept = thread::spawn(move || l_accept_clone.accept());

  thread::sleep(Duration::from_millis(30));
  listener.close();
  l_accept.close();

  assert!(matches!(blocked_dial.join().unwrap(), Err(NetError::Closed)));
  assert!(matches!(blocked_accept.join().unwrap(), Err(NetError::Closed)));
}

#[test]
fn builder_normalises_zero_capacity_to_one() {
  let listener = ListenerBuilder::new("lifecycle:4").capacity(0).accept_timeout_ms(50).build().unwrap();
  let _only_slot = listener.dial().unwrap();
  assert!(matches!(listener.dial(), Err(NetError::DeadlineExceeded)));
}
