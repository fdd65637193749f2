//! Server lifecycle: ordered startup, the acceptor, the five-worker
//! concurrency gate, and graceful shutdown.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use crate::config::{Config, LISTEN_BACKLOG, RING_CAPACITY, WORKER_COUNT};
use crate::connection::{self, ConnRegistry, Disconnect};
use crate::error::ServerError;
use crate::filter::DigitsFilter;
use crate::journal::{self, Journal};
use crate::journal_writer::{self, JournalWriter};
use crate::shutdown::{self, Shutdown};
use crate::stats::{self, Statistics};
use crate::wait::Waiter;

/// Bind the listener through socket2 so reuse-address and the backlog are
/// under our control, then hand back a blocking std listener.
fn create_listener(port: u16) -> Result<(TcpListener, SocketAddr), ServerError> {
    let bind = || -> io::Result<(TcpListener, SocketAddr)> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        socket.bind(&addr.into())?;
        socket.listen(LISTEN_BACKLOG)?;
        let listener: TcpListener = socket.into();
        let local = listener.local_addr()?;
        Ok((listener, local))
    };
    bind().map_err(|source| ServerError::Bind { port, source })
}

/// A running server. Owns every thread handle; the ownership graph below it
/// is a DAG. Components hold `Arc` handles passed down from here; nothing
/// points back up.
pub struct Server {
    addr: SocketAddr,
    journal_path: PathBuf,
    stats: Arc<Statistics>,
    shutdown: Arc<Shutdown>,
    acceptor: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    consumer: JoinHandle<()>,
    reporter: JoinHandle<()>,
}

impl Server {
    /// Ordered startup: dedup bitmap → journal file → statistics reporter →
    /// journal writer → listener, acceptor, and workers → signal handlers.
    pub fn start(config: Config) -> Result<Self, ServerError> {
        let stats = Arc::new(Statistics::new());
        let shutdown = Arc::new(Shutdown::new());
        let waiter = Arc::new(Waiter::new());
        shutdown.set_waiter(Arc::clone(&waiter));

        // one allocation for the whole run
        let filter = DigitsFilter::new();

        let (file, journal_path) = journal_writer::create_journal_file(&config.journal_dir)?;
        info!(path = %journal_path.display(), "created journal file");

        let reporter = stats::spawn_reporter(Arc::clone(&stats), Arc::clone(&shutdown));

        let (producer, poller) = journal::build_ring(RING_CAPACITY);
        let writer = JournalWriter::new(
            poller,
            filter,
            file,
            Arc::clone(&stats),
            Arc::clone(&waiter),
            config.wait,
        );
        let consumer = thread::Builder::new()
            .name("journal-writer".into())
            .spawn(move || writer.run())
            .expect("failed to spawn journal writer");

        let (listener, addr) = match create_listener(config.port) {
            Ok(bound) => bound,
            Err(err) => {
                shutdown.trigger();
                drop(producer);
                let _ = consumer.join();
                let _ = reporter.join();
                return Err(err);
            }
        };
        info!(%addr, workers = WORKER_COUNT, single_threaded = config.single_threaded, "listening");
        shutdown.set_wake_addr(addr);

        let registry = Arc::new(ConnRegistry::new());
        shutdown.set_registry(Arc::clone(&registry));

        let journal = Journal::new(
            producer,
            Arc::clone(&shutdown),
            Arc::clone(&waiter),
            config.wait,
        );

        let (workers, acceptor) = if config.single_threaded {
            let acceptor =
                spawn_inline_acceptor(listener, journal, registry, Arc::clone(&shutdown));
            (Vec::new(), acceptor)
        } else {
            let (tx, rx) = bounded::<TcpStream>(0);
            let workers = (0..WORKER_COUNT)
                .map(|index| {
                    spawn_worker(
                        index,
                        rx.clone(),
                        journal.clone(),
                        Arc::clone(&registry),
                        Arc::clone(&shutdown),
                    )
                })
                .collect();
            // workers hold their own journal clones and channel ends
            drop(rx);
            drop(journal);
            let acceptor = spawn_acceptor(listener, tx, Arc::clone(&shutdown));
            (workers, acceptor)
        };

        let server = Self {
            addr,
            journal_path,
            stats,
            shutdown: Arc::clone(&shutdown),
            acceptor,
            workers,
            consumer,
            reporter,
        };

        if let Err(err) = shutdown::install_signal_handlers(shutdown) {
            server.initiate_shutdown();
            server.wait();
            return Err(err);
        }

        Ok(server)
    }

    /// Address the listener actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    pub fn statistics(&self) -> &Arc<Statistics> {
        &self.stats
    }

    /// Kick off the shutdown sequence without waiting for it to finish.
    pub fn initiate_shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Block until the server has fully stopped and every thread is joined.
    /// The ring has been drained and the journal flushed when this returns.
    pub fn wait(self) {
        let _ = self.acceptor.join();
        for worker in self.workers {
            let _ = worker.join();
        }
        // every producer is gone once the workers are; the writer drains the
        // ring, flushes, and exits
        let _ = self.consumer.join();
        let _ = self.reporter.join();
    }
}

fn spawn_acceptor(
    listener: TcpListener,
    handoff: Sender<TcpStream>,
    shutdown: Arc<Shutdown>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("acceptor".into())
        .spawn(move || loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if shutdown.is_stopped() {
                        // wake connect, or a late client during shutdown
                        return;
                    }
                    debug!(%peer, "accepted connection");
                    // rendezvous send: blocks until a worker is free, so
                    // surplus clients wait in the kernel backlog unread
                    if handoff.send(stream).is_err() {
                        return;
                    }
                }
                Err(error) => {
                    if shutdown.is_stopped() {
                        return;
                    }
                    warn!(%error, "accept failed");
                }
            }
        })
        .expect("failed to spawn acceptor")
}

fn spawn_worker(
    index: usize,
    handoff: Receiver<TcpStream>,
    mut journal: Journal,
    registry: Arc<ConnRegistry>,
    shutdown: Arc<Shutdown>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("worker-{index}"))
        .spawn(move || {
            for stream in handoff.iter() {
                if shutdown.is_stopped() {
                    return;
                }
                match connection::handle_connection(stream, &mut journal, &registry, &shutdown) {
                    Disconnect::Terminate => {
                        shutdown.trigger();
                        return;
                    }
                    Disconnect::Closed => {}
                }
            }
        })
        .expect("failed to spawn worker")
}

/// Single-threaded mode: the acceptor serves each connection to completion
/// inline. Same observable semantics as the pool, with a concurrency cap of
/// one.
fn spawn_inline_acceptor(
    listener: TcpListener,
    mut journal: Journal,
    registry: Arc<ConnRegistry>,
    shutdown: Arc<Shutdown>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("acceptor".into())
        .spawn(move || loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if shutdown.is_stopped() {
                        return;
                    }
                    debug!(%peer, "accepted connection");
                    if let Disconnect::Terminate =
                        connection::handle_connection(stream, &mut journal, &registry, &shutdown)
                    {
                        shutdown.trigger();
                        return;
                    }
                }
                Err(error) => {
                    if shutdown.is_stopped() {
                        return;
                    }
                    warn!(%error, "accept failed");
                }
            }
        })
        .expect("failed to spawn acceptor")
}
