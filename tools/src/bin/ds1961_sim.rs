use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use libds1961::eh_delay::DelayNs;
use libds1961::onewire::backend::sim::{SimDelay, SimulatedDs1961};
use libds1961::onewire::delay::StdDelay;
use libds1961::{
    auth, BinarySecret, ConfigKey, Configuration, DeviceId, DeviceState, Ds1961, Ds1961Host,
    PrintableSecret,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

#[derive(Parser)]
#[command(about = "Drive a simulated DS1961S SHA iButton through its parameter surface")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// 64-bit registration number of the simulated device
    #[arg(long, default_value = "0x0123456789ABCDEF", value_parser = parse_u64, global = true)]
    device_id: u64,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Apply key=value updates one at a time, then print the report.
    /// Prefix a value with `hex:` to pass raw bytes.
    Run {
        /// Seed for secret and challenge generation
        #[arg(long)]
        seed: Option<u64>,

        /// Sleep through the real tCSHA / tPROG windows
        #[arg(long)]
        real_time: bool,

        /// Updates such as `secret=ABCDEFGHIJKLMNOP` or `data_mac=hex:00..`
        #[arg(required = true)]
        updates: Vec<String>,
    },
    /// Compute the Read Authenticated Page MAC offline
    Mac {
        /// Page address
        #[arg(long, value_parser = parse_u16)]
        address: u16,

        /// 32 bytes of page data as hex (default: zeros)
        #[arg(long)]
        page: Option<String>,

        /// 16-character printable secret
        #[arg(long, conflicts_with = "secret8")]
        secret: Option<String>,

        /// 8-byte binary secret as hex
        #[arg(long)]
        secret8: Option<String>,

        /// 3-byte challenge as hex
        #[arg(long)]
        challenge: String,
    },
}

fn parse_u64(s: &str) -> Result<u64, String> {
    match s.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| e.to_string())
}

fn parse_u16(s: &str) -> Result<u16, String> {
    parse_u64(s).and_then(|v| u16::try_from(v).map_err(|e| e.to_string()))
}

fn parse_update(update: &str) -> Result<(ConfigKey, Vec<u8>)> {
    let (key, value) = update
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got {update:?}"))?;
    let key: ConfigKey = key.parse()?;
    let value = match value.strip_prefix("hex:") {
        Some(hex_value) => hex::decode(hex_value).with_context(|| format!("bad hex for {key:?}"))?,
        None => value.as_bytes().to_vec(),
    };
    Ok((key, value))
}

fn decode_fixed<const N: usize>(name: &str, hex_value: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(hex_value).with_context(|| format!("bad hex for {name}"))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow!("{name} must be {N} bytes, got {}", b.len()))
}

fn run<D: DelayNs>(device_id: DeviceId, seed: u64, delay: D, updates: &[String]) -> Result<()> {
    let sim = SimulatedDs1961::new(device_id);
    let id = sim.device_id();
    let mut host = Ds1961Host::new(Ds1961::new(sim, delay), id, StdRng::seed_from_u64(seed));

    let mut state = DeviceState::default();
    for update in updates {
        let (key, value) = parse_update(update)?;
        let mut config = Configuration::new();
        config.set(key, &value)?;
        state = host
            .apply(&state, &config)
            .with_context(|| format!("applying {}", key.name()))?;
        log::info!("applied {}", key.name());
    }

    for (name, value) in host.report(&state).entries() {
        match name {
            "generated_secret" | "authenticated" => {
                println!("{name}: {}", String::from_utf8_lossy(&value))
            }
            _ => println!("{name}: {}", hex::encode(&value)),
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    simple_logger::init_with_level(level)?;

    let device_id = DeviceId::new(cli.device_id);

    match cli.command {
        Cmd::Run {
            seed,
            real_time,
            updates,
        } => {
            let seed = seed.unwrap_or_else(rand::random);
            log::debug!("rng seed: {seed}");
            if real_time {
                run(device_id, seed, StdDelay, &updates)
            } else {
                run(device_id, seed, SimDelay::new(), &updates)
            }
        }
        Cmd::Mac {
            address,
            page,
            secret,
            secret8,
            challenge,
        } => {
            let page = match page {
                Some(page) => decode_fixed::<32>("page", &page)?,
                None => [0u8; 32],
            };
            let secret = match (secret, secret8) {
                (Some(text), None) => PrintableSecret::from_bytes(text.as_bytes())?.to_binary(),
                (None, Some(hex_value)) => BinarySecret::new(decode_fixed::<8>("secret8", &hex_value)?),
                _ => bail!("pass exactly one of --secret or --secret8"),
            };
            let challenge = decode_fixed::<3>("challenge", &challenge)?;

            let mac = auth::compute_expected_mac(address, &page, &secret, &challenge, device_id);
            println!("{}", hex::encode(mac));
            Ok(())
        }
    }
}
