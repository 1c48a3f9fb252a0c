//! Command-line client for the file manager daemon.
//!
//! Sends one payload to a verb endpoint and prints the result code.

use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use fm_daemon::commands::Verb;
use fm_daemon::protocol::{decode_result, describe_result, encode_request, RESULT_FRAME_LEN};

const DEFAULT_SOCKET_DIR: &str = "/run/fm-daemon";
const IO_TIMEOUT: Duration = Duration::from_secs(30);

struct Invocation {
    socket_dir: PathBuf,
    verb: Verb,
    payload: Vec<u8>,
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("fmctl: {}", message);
            eprintln!("Run 'fmctl --help' for usage.");
            return ExitCode::from(2);
        }
    };

    match send(&invocation) {
        Ok(code) => {
            println!("{}", describe_result(code));
            if code < 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("fmctl: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Result<Invocation, String> {
    let mut socket_dir = PathBuf::from(DEFAULT_SOCKET_DIR);
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--socket-dir" || arg == "-s" {
            let dir = iter
                .next()
                .ok_or_else(|| format!("{} requires a directory", arg))?;
            socket_dir = PathBuf::from(dir);
        } else if let Some(dir) = arg.strip_prefix("--socket-dir=") {
            socket_dir = PathBuf::from(dir);
        } else {
            positional.push(arg.as_str());
        }
    }

    let (verb_name, payload) = match positional.as_slice() {
        [verb, payload] => (*verb, *payload),
        _ => return Err("expected <verb> <payload>".to_string()),
    };

    let verb = Verb::from_name(verb_name).ok_or_else(|| {
        format!(
            "unknown verb '{}' (valid: {})",
            verb_name,
            Verb::ALL
                .iter()
                .map(|v| v.name())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;

    Ok(Invocation {
        socket_dir,
        verb,
        payload: expand_escapes(payload).into_bytes(),
    })
}

/// Expand `\n` and `\\`. Any other backslash sequence is kept as written.
fn expand_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

fn send(invocation: &Invocation) -> Result<i64, Box<dyn std::error::Error>> {
    let path = invocation
        .socket_dir
        .join(format!("{}.sock", invocation.verb));
    let mut stream = UnixStream::connect(&path)
        .map_err(|e| format!("failed to connect to {}: {}", path.display(), e))?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;

    stream.write_all(&encode_request(&invocation.payload)?)?;

    let mut frame = [0u8; RESULT_FRAME_LEN];
    stream.read_exact(&mut frame)?;
    Ok(decode_result(frame))
}

fn print_help() {
    println!(
        r#"fmctl {}
Send a command to the file manager daemon.

USAGE:
    fmctl [OPTIONS] <VERB> <PAYLOAD>

VERBS:
    create, update, delete-file, delete-folder,
    rename-file, rename-folder, create-folder

OPTIONS:
    -s, --socket-dir <DIR>    Socket directory [default: {}]
    -h, --help                Print help information

PAYLOAD escapes: \n is a newline, \\ is a backslash.

EXAMPLE:
    fmctl create '/tmp/hello\nworld'"#,
        env!("CARGO_PKG_VERSION"),
        DEFAULT_SOCKET_DIR
    );
}
