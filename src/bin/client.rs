use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::process;

use clap::Parser;

use rudp::{chat, send_file, Connection, Error, EventLog};

#[derive(Parser, Debug)]
#[command(about = "reliable-UDP client: send a file to the server, or chat with it")]
struct Args {
    /// server host
    host: String,

    /// server port
    port: u16,

    /// interactive chat instead of file transfer
    #[arg(long)]
    chat: bool,

    /// file mode: <input> <output> [loss_rate] — chat mode: [loss_rate]
    rest: Vec<String>,
}

// loss injection happens on the receiving side, and the server picks its own
// output name; both arguments are still accepted to keep the documented
// interface
#[allow(dead_code)]
#[derive(Debug, PartialEq)]
enum Mode {
    File {
        input: PathBuf,
        output: PathBuf,
        loss_rate: f32,
    },
    Chat {
        loss_rate: f32,
    },
}

fn parse_mode(chat: bool, rest: &[String]) -> Result<Mode, Error> {
    let parse_rate = |s: &String| {
        s.parse::<f32>()
            .map_err(|_| Error::Setup(format!("invalid loss rate '{s}'")))
    };

    if chat {
        match rest {
            [] => Ok(Mode::Chat { loss_rate: 0.0 }),
            [rate] => Ok(Mode::Chat {
                loss_rate: parse_rate(rate)?,
            }),
            _ => Err(Error::Setup(
                "usage: client <host> <port> --chat [loss_rate]".into(),
            )),
        }
    } else {
        match rest {
            [input, output] => Ok(Mode::File {
                input: input.into(),
                output: output.into(),
                loss_rate: 0.0,
            }),
            [input, output, rate] => Ok(Mode::File {
                input: input.into(),
                output: output.into(),
                loss_rate: parse_rate(rate)?,
            }),
            _ => Err(Error::Setup(
                "usage: client <host> <port> <input_file> <output_file> [loss_rate]".into(),
            )),
        }
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, Error> {
    (host, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| Error::Setup(format!("invalid server address '{host}:{port}'")))
}

fn run(args: Args) -> Result<(), Error> {
    let mode = parse_mode(args.chat, &args.rest)?;

    if let Mode::File { input, .. } = &mode {
        let meta = fs::metadata(input).map_err(|e| {
            Error::Setup(format!("cannot open input file '{}': {e}", input.display()))
        })?;
        if meta.len() == 0 {
            return Err(Error::Setup(format!(
                "input file '{}' is empty",
                input.display()
            )));
        }
        println!("input file '{}' validated ({} bytes)", input.display(), meta.len());
    }

    let log = EventLog::from_env("client_log.txt")?;
    let addr = resolve(&args.host, args.port)?;

    let mut conn = Connection::connect(addr, log)?;
    println!("connection established");

    match mode {
        Mode::File { input, .. } => {
            send_file(&mut conn, &input)?;
            println!("file sent successfully");
        }
        Mode::Chat { .. } => chat(&mut conn)?,
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("{e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn file_mode_without_rate() {
        let mode = parse_mode(false, &strings(&["in.txt", "out.txt"])).unwrap();
        assert_eq!(
            mode,
            Mode::File {
                input: "in.txt".into(),
                output: "out.txt".into(),
                loss_rate: 0.0
            }
        );
    }

    #[test]
    fn file_mode_with_rate() {
        let mode = parse_mode(false, &strings(&["in.txt", "out.txt", "0.1"])).unwrap();
        assert!(matches!(mode, Mode::File { loss_rate, .. } if loss_rate == 0.1));
    }

    #[test]
    fn chat_mode_with_and_without_rate() {
        assert_eq!(
            parse_mode(true, &[]).unwrap(),
            Mode::Chat { loss_rate: 0.0 }
        );
        assert!(matches!(
            parse_mode(true, &strings(&["0.25"])).unwrap(),
            Mode::Chat { loss_rate } if loss_rate == 0.25
        ));
    }

    #[test]
    fn bad_shapes_are_setup_errors() {
        assert!(matches!(
            parse_mode(false, &strings(&["in.txt"])),
            Err(Error::Setup(_))
        ));
        assert!(matches!(
            parse_mode(true, &strings(&["0.1", "extra"])),
            Err(Error::Setup(_))
        ));
        assert!(matches!(
            parse_mode(false, &strings(&["in.txt", "out.txt", "lots"])),
            Err(Error::Setup(_))
        ));
    }
}
