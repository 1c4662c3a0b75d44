use std::io::{BufRead, BufReader, Write};
use std::time::Duration;

use structopt::StructOpt;

enum Command {
    /// Read a key from the connected node
    Get {
        key: String,
    },

    /// Write a key through consensus
    Put {
        key: String,
        value: String,
    },

    /// Delete a key through consensus
    Delete {
        key: String,
    },

    Help,
}

fn usage() {
    println!(
        "{}{}{}{}{}{}",
        "--------------------------------------------------------------\n",
        "Possible commands:\n",
        "get <KEY>         | g <KEY>          -- Read <KEY>\n",
        "put <KEY> <VALUE> | p <KEY> <VALUE>  -- Write <VALUE> to <KEY>\n",
        "delete <KEY>      | d <KEY>          -- Delete <KEY>\n",
        "--------------------------------------------------------------",
    );
}

impl std::str::FromStr for Command {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut iter = s.trim().splitn(3, ' ');
        let command = iter.next();
        let key = iter.next().map(str::to_string);
        let value = iter.next().map(str::to_string);
        match (command, key, value) {
        | (Some("help"), _, _) | (Some("h"), _, _) => Ok(Command::Help),
        | (Some("get"), Some(key), None) | (Some("g"), Some(key), None) => Ok(Command::Get { key }),
        | (Some("delete"), Some(key), None) | (Some("d"), Some(key), None) => Ok(Command::Delete { key }),
        | (Some("put"), Some(key), Some(value)) | (Some("p"), Some(key), Some(value)) => {
            Ok(Command::Put { key, value })
        }
        | _ => Err(()),
        }
    }
}

const SAMPLE: [(&str, &str); 5] = [
    ("Name", "Diya"),
    ("Age", "20"),
    ("Course", "Distributed Systems"),
    ("School", "Northeastern University"),
    ("City", "California"),
];

fn outcome(result: paxoskv::Result<bool>) -> String {
    match result {
    | Ok(true) => "Succeeded".to_string(),
    | Ok(false) => "Failed".to_string(),
    | Err(error) => format!("Failed ({})", error),
    }
}

/// Five puts, five gets, five deletes over sample pairs.
async fn demo(client: &paxoskv::Client) {
    println!("Performing {} PUT operations...", SAMPLE.len());
    for (key, value) in SAMPLE.iter() {
        println!("PUT {} -> {}: {}", key, value, outcome(client.put(key, value).await));
    }

    println!("\nPerforming {} GET operations...", SAMPLE.len());
    for (key, _) in SAMPLE.iter() {
        match client.get(key).await {
        | Ok(Some(value)) => println!("GET {}: {}", key, value),
        | Ok(None) => println!("GET {}: Key not found", key),
        | Err(error) => println!("GET {}: Failed ({})", key, error),
        }
    }

    println!("\nPerforming {} DELETE operations...", SAMPLE.len());
    for (key, _) in SAMPLE.iter() {
        println!("DELETE {}: {}", key, outcome(client.delete(key).await));
    }

    println!("\nAll operations completed.");
}

async fn interactive(client: &paxoskv::Client) {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut lines = BufReader::new(stdin.lock()).lines();

    loop {
        print!("> ");
        stdout.flush().ok();

        let line = match lines.next() {
        | Some(Ok(line)) => line,
        | _ => return,
        };

        // Attempt to parse command from user input
        let command = match line.parse::<Command>() {
        | Ok(command) => command,
        | Err(()) => {
            println!("[ERROR]: could not parse command");
            continue
        }
        };

        match command {
        | Command::Get { key } => match client.get(&key).await {
            | Ok(Some(value)) => println!("[RESPONSE]: {}", value),
            | Ok(None) => println!("[RESPONSE]: key not found"),
            | Err(error) => println!("[ERROR]: {}", error),
        },
        | Command::Put { key, value } => {
            println!("[RESPONSE]: {}", outcome(client.put(&key, &value).await))
        }
        | Command::Delete { key } => {
            println!("[RESPONSE]: {}", outcome(client.delete(&key).await))
        }
        | Command::Help => usage(),
        }
    }
}

#[derive(StructOpt)]
#[structopt(name = "paxoskv-client")]
struct Opt {
    /// Server host
    #[structopt(long = "host", env = "SERVER_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[structopt(short = "p", long = "port", env = "SERVER_PORT")]
    port: u16,

    /// Request timeout (in milliseconds). Must exceed the server's worst-case
    /// write: attempts * 3 * server timeout, plus backoff. Defaults to 20000,
    /// enough for a server on default settings.
    #[structopt(short = "t", long = "timeout")]
    timeout: Option<u64>,

    /// Read commands from stdin instead of running the demo sequence
    #[structopt(short = "i", long = "interactive")]
    interactive: bool,
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();
    let address = format!("{}:{}", opt.host, opt.port);

    let timeout = opt.timeout
        .map(Duration::from_millis)
        .unwrap_or(paxoskv::client::DEFAULT_TIMEOUT);

    let client = match paxoskv::Client::connect(address.as_str(), timeout).await {
    | Ok(client) => {
        println!("Connected to server at {}", client.address());
        client
    }
    | Err(error) => {
        eprintln!("[ERROR]: failed to connect to server at {}: {}", address, error);
        std::process::exit(1);
    }
    };

    if opt.interactive {
        interactive(&client).await
    } else {
        demo(&client).await
    }
}
