//! Test and load client for the digitsd server.

use std::io::Write;
use std::net::TcpStream;
use std::thread;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rand::Rng;

use digitsd::constants::{KEY_SPACE, LINE_LEN, TERMINATE_LINE};

/// Batch outgoing lines so the socket sees large writes.
const SEND_BUF_SIZE: usize = 60 * 1024;

#[derive(Parser)]
#[command(about = "Test client for the digitsd ingestion server")]
struct Args {
    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 4000)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send sequential nine-digit lines from one connection
    Send {
        /// Number of lines to send
        #[arg(short, long, default_value_t = 1000)]
        count: u64,
        /// First value of the sequential range
        #[arg(short, long, default_value_t = 0)]
        start: u32,
    },
    /// Concurrent connections sending random lines, with a throughput report
    Load {
        /// Number of concurrent connections
        #[arg(short, long, default_value_t = 4)]
        connections: usize,
        /// Lines per connection
        #[arg(short = 'n', long, default_value_t = 100_000)]
        count: u64,
    },
    /// Send the terminate line
    Terminate,
}

fn digit_line(value: u32) -> [u8; LINE_LEN] {
    let mut line = [0u8; LINE_LEN];
    write!(&mut line[..], "{value:09}\n").expect("line is exactly ten bytes");
    line
}

fn send_sequential(addr: &str, start: u32, count: u64) {
    let mut stream = TcpStream::connect(addr).expect("failed to connect");
    let mut buf = Vec::with_capacity(SEND_BUF_SIZE);
    let mut value = start;
    for _ in 0..count {
        buf.extend_from_slice(&digit_line(value));
        value = (value + 1) % KEY_SPACE;
        if buf.len() + LINE_LEN > SEND_BUF_SIZE {
            stream.write_all(&buf).expect("failed to write");
            buf.clear();
        }
    }
    stream.write_all(&buf).expect("failed to write");
    eprintln!("sent {count} lines starting at {start:09}");
}

fn send_random(addr: &str, count: u64) {
    let mut stream = TcpStream::connect(addr).expect("failed to connect");
    let mut rng = rand::thread_rng();
    let mut buf = Vec::with_capacity(SEND_BUF_SIZE);
    for _ in 0..count {
        buf.extend_from_slice(&digit_line(rng.gen_range(0..KEY_SPACE)));
        if buf.len() + LINE_LEN > SEND_BUF_SIZE {
            stream.write_all(&buf).expect("failed to write");
            buf.clear();
        }
    }
    stream.write_all(&buf).expect("failed to write");
}

fn load_test(addr: &str, connections: usize, count: u64) {
    eprintln!("load: {connections} connections x {count} lines against {addr}");
    let started = Instant::now();
    let handles: Vec<_> = (0..connections)
        .map(|_| {
            let addr = addr.to_owned();
            thread::spawn(move || send_random(&addr, count))
        })
        .collect();
    for handle in handles {
        handle.join().expect("sender thread panicked");
    }
    let elapsed = started.elapsed();
    let total = connections as u64 * count;
    let rate = total as f64 / elapsed.as_secs_f64();
    eprintln!(
        "sent {total} lines in {:.2}s ({rate:.0} lines/s)",
        elapsed.as_secs_f64()
    );
}

fn terminate(addr: &str) {
    let mut stream = TcpStream::connect(addr).expect("failed to connect");
    stream
        .write_all(TERMINATE_LINE)
        .expect("failed to write terminate");
    eprintln!("terminate sent");
}

fn main() {
    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);

    match args.command {
        Command::Send { count, start } => send_sequential(&addr, start, count),
        Command::Load { connections, count } => load_test(&addr, connections, count),
        Command::Terminate => terminate(&addr),
    }
}
