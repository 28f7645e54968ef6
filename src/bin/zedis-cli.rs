use bytes::BytesMut;
use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;

use zedis::protocol::{self, ErrorCode, Reply};

fn main() -> io::Result<()> {
    let mut host = "127.0.0.1".to_string();
    let mut port = 1234u16;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--host" | "-h" => {
                if i + 1 < args.len() {
                    host = args[i + 1].clone();
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    if let Ok(p) = args[i + 1].parse() {
                        port = p;
                    }
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    let addr = format!("{host}:{port}");
    let mut stream = TcpStream::connect(&addr)?;
    eprintln!("Connected to {addr}");

    let stdin = io::stdin();
    let mut reader = stdin.lock();

    loop {
        print!("zedis> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            break; // EOF
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        let tokens: Vec<&[u8]> = line.split_whitespace().map(str::as_bytes).collect();

        let mut buf = BytesMut::new();
        protocol::write_request(&mut buf, &tokens);
        stream.write_all(&buf)?;

        let mut len_bytes = [0u8; 4];
        if stream.read_exact(&mut len_bytes).is_err() {
            eprintln!("Connection closed by server");
            return Ok(());
        }
        let len = u32::from_le_bytes(len_bytes) as usize;
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body)?;

        match protocol::parse_reply(&body) {
            Ok(reply) => print_reply(&reply),
            Err(e) => {
                eprintln!("Protocol error: {e}");
                break;
            }
        }
    }

    Ok(())
}

fn print_reply(reply: &Reply) {
    match reply {
        Reply::Array(items) => {
            if items.is_empty() {
                println!("(empty array)");
            } else {
                for (i, item) in items.iter().enumerate() {
                    print!("{}) ", i + 1);
                    print_reply_inline(item);
                }
            }
        }
        other => print_reply_inline(other),
    }
}

fn print_reply_inline(reply: &Reply) {
    match reply {
        Reply::Nil => println!("(nil)"),
        Reply::Error(code, msg) => println!("(error) {} {msg}", code_name(*code)),
        Reply::String(data) => println!("\"{}\"", String::from_utf8_lossy(data)),
        Reply::Integer(n) => println!("(integer) {n}"),
        Reply::Double(d) => println!("(double) {d}"),
        Reply::Array(items) => {
            println!("(array of {})", items.len());
            for (i, item) in items.iter().enumerate() {
                print!("   {}) ", i + 1);
                print_reply_inline(item);
            }
        }
    }
}

fn code_name(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Unknown => "UNKNOWN",
        ErrorCode::Type => "TYPE",
        ErrorCode::Arg => "ARG",
    }
}
