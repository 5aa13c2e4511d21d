use std::path::Path;
use std::process;

use clap::Parser;

use rudp::{chat, file_md5, receive_file, Error, EventLog, Listener, LossSim};

/// Fixed output name in file mode; the client's `<output_file>` argument is
/// advisory only.
const OUTPUT_FILENAME: &str = "received_file";

#[derive(Parser, Debug)]
#[command(about = "reliable-UDP server: receive one file, or chat with the client")]
struct Args {
    /// UDP port to listen on
    port: u16,

    /// interactive chat instead of file transfer
    #[arg(long)]
    chat: bool,

    /// probability of dropping an inbound data frame, for loss testing
    loss_rate: Option<f32>,
}

fn run(args: Args) -> Result<(), Error> {
    let log = EventLog::from_env("server_log.txt")?;

    let listener = Listener::bind(args.port, log)?;
    eprintln!("server listening on port {}", args.port);

    let mut conn = listener.accept()?;
    eprintln!("connection established");

    if args.chat {
        chat(&mut conn)?;
    } else {
        let mut loss = LossSim::new(args.loss_rate.unwrap_or(0.0));
        let output = Path::new(OUTPUT_FILENAME);

        receive_file(&mut conn, output, &mut loss)?;
        eprintln!("file received successfully");
        println!("MD5: {}", file_md5(output).map_err(Error::Source)?);
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
