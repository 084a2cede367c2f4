//! Stream doubles shared by the unit tests in this crate.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::rc::Rc;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use muxstream_frame::{decode_frame, encode, FrameReader};
use muxstream_transport::Transport;

use crate::datagram::Datagram;

#[derive(Clone)]
pub(crate) enum Step {
    Data(Vec<u8>),
    WouldBlock,
    TimedOut,
}

/// Observable state of a [`MockStream`], kept after the stream is moved.
#[derive(Default)]
pub(crate) struct Probe {
    written: RefCell<Vec<u8>>,
    nonblocking: Cell<bool>,
    shut_down: Cell<bool>,
    read_timeout: Cell<Option<Duration>>,
    reads: Cell<usize>,
}

impl Probe {
    pub(crate) fn written(&self) -> Vec<u8> {
        self.written.borrow().clone()
    }

    /// Datagrams written after the first `skip` raw bytes.
    pub(crate) fn datagrams_after(&self, skip: usize) -> Vec<Datagram> {
        let mut wire = BytesMut::from(&self.written.borrow()[skip..]);
        let mut out = Vec::new();
        while let Some(payload) = decode_frame(&mut wire).unwrap() {
            out.push(Datagram::decode(payload).unwrap());
        }
        assert!(wire.is_empty(), "trailing partial frame in output");
        out
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shut_down.get()
    }

    pub(crate) fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout.get()
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.get()
    }
}

/// Replays scripted reads and captures writes.
///
/// Once the script runs out a non-blocking read reports `WouldBlock` and a
/// blocking read reports EOF.
pub(crate) struct MockStream {
    steps: VecDeque<Step>,
    probe: Rc<Probe>,
}

impl MockStream {
    pub(crate) fn new(steps: Vec<Step>) -> (Self, Rc<Probe>) {
        let probe = Rc::new(Probe::default());
        (
            Self {
                steps: steps.into(),
                probe: Rc::clone(&probe),
            },
            probe,
        )
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.probe.reads.set(self.probe.reads.get() + 1);
        match self.steps.pop_front() {
            None if self.probe.nonblocking.get() => Err(ErrorKind::WouldBlock.into()),
            None => Ok(0),
            Some(Step::WouldBlock) => Err(ErrorKind::WouldBlock.into()),
            Some(Step::TimedOut) => Err(ErrorKind::TimedOut.into()),
            Some(Step::Data(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.steps.push_front(Step::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
        }
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.probe.shut_down.get() {
            return Err(ErrorKind::BrokenPipe.into());
        }
        self.probe.written.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Transport for MockStream {
    fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
        self.probe.nonblocking.set(nonblocking);
        Ok(())
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.probe.read_timeout.set(timeout);
        Ok(())
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        self.probe.shut_down.set(true);
        Ok(())
    }
}

/// Wire bytes of one frame.
pub(crate) fn frame(payload: &[u8]) -> Vec<u8> {
    encode(payload).unwrap().to_vec()
}

/// A loopback streaming node that accepts one client, answers the version
/// byte with `reply`, reads the token datagram, then hands the socket to
/// `script`. Returns the port and the join handle yielding the token.
pub(crate) fn fake_node<F>(reply: u8, script: F) -> (u16, JoinHandle<Bytes>)
where
    F: FnOnce(&mut TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = std::thread::spawn(move || {
        let (mut socket, _) = listener.accept().unwrap();
        let mut version = [0u8; 1];
        socket.read_exact(&mut version).unwrap();
        assert_eq!(version[0], 0x01);
        socket.write_all(&[reply]).unwrap();

        let token = match Datagram::decode(FrameReader::new(&mut socket).read_frame().unwrap())
            .unwrap()
        {
            Datagram::TokenAuth { token } => token,
            other => panic!("expected token datagram, got {other:?}"),
        };
        script(&mut socket);
        token
    });
    (port, handle)
}

/// Read one datagram from a fake node's socket.
pub(crate) fn read_datagram(socket: &mut TcpStream) -> Datagram {
    Datagram::decode(FrameReader::new(socket).read_frame().unwrap()).unwrap()
}

/// Write one datagram to a fake node's socket.
pub(crate) fn write_datagram(socket: &mut TcpStream, datagram: &Datagram) {
    socket.write_all(&frame(&datagram.encode())).unwrap();
}
