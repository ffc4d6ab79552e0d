//! OBDH ground control CLI: builds and authenticates telecommand packets,
//! sends them to a running `obdh-sim` over TCP, and prints the feedback.

use std::process::Command;

use clap::{App, Arg, ArgMatches, SubCommand};
use colored::*;
use hmac::{Hmac, Mac};
use obdh_core::config::{tc_id, tc_key, CALLSIGN_FIELD_LEN, HMAC_TAG_LEN};
use obdh_core::spp::{self, SppType};
use sha1::Sha1;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "8090";
const GROUND_CALLSIGN: &str = "GNDSTN";

type HmacSha1 = Hmac<Sha1>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("obdh-ctl")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("Ground control CLI for the OBDH core simulator")
        .arg(Arg::with_name("host").long("host").takes_value(true).default_value(DEFAULT_HOST).global(true))
        .arg(Arg::with_name("port").long("port").takes_value(true).default_value(DEFAULT_PORT).global(true))
        .subcommand(SubCommand::with_name("ping").about("Send an unauthenticated ping"))
        .subcommand(
            SubCommand::with_name("data-req")
                .about("Request a page range from a telemetry family's log")
                .arg(Arg::with_name("data-id").required(true).help("0=obdh 1=eps 2=ttc0 3=ttc1 4=antenna 5=edc 6=sbcd 7=px"))
                .arg(Arg::with_name("start").required(true))
                .arg(Arg::with_name("end").required(true)),
        )
        .subcommand(
            SubCommand::with_name("hibernate")
                .about("Enter hibernation for N hours")
                .arg(Arg::with_name("hours").required(true)),
        )
        .subcommand(SubCommand::with_name("wake").about("Leave hibernation"))
        .subcommand(
            SubCommand::with_name("activate")
                .about("Activate a module")
                .arg(Arg::with_name("module-id").required(true)),
        )
        .subcommand(
            SubCommand::with_name("deactivate")
                .about("Deactivate a module")
                .arg(Arg::with_name("module-id").required(true)),
        )
        .subcommand(
            SubCommand::with_name("activate-payload")
                .about("Activate a payload slot")
                .arg(Arg::with_name("payload").required(true).possible_values(&["edc-a", "edc-b", "payload-x"])),
        )
        .subcommand(
            SubCommand::with_name("deactivate-payload")
                .about("Deactivate a payload slot")
                .arg(Arg::with_name("payload").required(true).possible_values(&["edc-a", "edc-b", "payload-x"])),
        )
        .subcommand(SubCommand::with_name("erase").about("Erase the telemetry log (FRAM configuration is kept)"))
        .subcommand(SubCommand::with_name("reset").about("Force an OBDH reset"))
        .subcommand(
            SubCommand::with_name("get-payload-data")
                .about("Read back a payload's latest telemetry snapshot")
                .arg(Arg::with_name("payload").required(true).possible_values(&["edc-a", "edc-b", "payload-x"]))
                .arg(Arg::with_name("offset").required(true)),
        )
        .subcommand(
            SubCommand::with_name("set-param")
                .about("Set an OBDH parameter: mode|main-edc|manual-mode|system-time|px-duration-ms")
                .arg(Arg::with_name("param").required(true))
                .arg(Arg::with_name("value").required(true)),
        )
        .subcommand(
            SubCommand::with_name("get-param")
                .about("Read back an OBDH parameter: mode|main-edc|manual-mode|system-time")
                .arg(Arg::with_name("param").required(true)),
        )
        .subcommand(
            SubCommand::with_name("update-tle")
                .about("Upload one 69-character TLE line (send twice, line 1 then line 2)")
                .arg(Arg::with_name("line-number").required(true).possible_values(&["1", "2"]))
                .arg(Arg::with_name("line").required(true)),
        )
        .subcommand(
            SubCommand::with_name("transmit")
                .about("Transmit a raw payload over the radio link (unauthenticated)")
                .arg(Arg::with_name("hex-payload").required(true)),
        )
        .subcommand(SubCommand::with_name("force-reset").about("Force an OBDH reset"))
        .subcommand(SubCommand::with_name("monitor").about("Connect and print decoded beacon frames"))
        .subcommand(SubCommand::with_name("server").about("Spawn a local obdh-sim instance"))
        .get_matches();

    let host = matches.value_of("host").unwrap();
    let port = matches.value_of("port").unwrap().parse::<u16>()?;

    match matches.subcommand() {
        ("monitor", _) => return run_monitor(host, port).await,
        ("server", _) => return run_server(),
        _ => {}
    }

    let pkt = match matches.subcommand() {
        ("ping", _) => build_ping(),
        ("data-req", Some(sub)) => build_data_request(sub)?,
        ("hibernate", Some(sub)) => build_hibernate(sub)?,
        ("wake", _) => build_unparameterized(tc_id::LEAVE_HIBERNATION, tc_key::LEAVE_HIBERNATION),
        ("activate", Some(sub)) => build_module(tc_id::ACTIVATE_MODULE, tc_key::ACTIVATE_MODULE, sub)?,
        ("deactivate", Some(sub)) => build_module(tc_id::DEACTIVATE_MODULE, tc_key::DEACTIVATE_MODULE, sub)?,
        ("activate-payload", Some(sub)) => build_payload_command(tc_id::ACTIVATE_PAYLOAD, tc_key::ACTIVATE_PAYLOAD, sub)?,
        ("deactivate-payload", Some(sub)) => build_payload_command(tc_id::DEACTIVATE_PAYLOAD, tc_key::DEACTIVATE_PAYLOAD, sub)?,
        ("erase", _) => build_unparameterized(tc_id::ERASE_MEMORY, tc_key::ERASE_MEMORY),
        ("reset" | "force-reset", _) => build_unparameterized(tc_id::FORCE_RESET, tc_key::FORCE_RESET),
        ("get-payload-data", Some(sub)) => build_get_payload_data(sub)?,
        ("set-param", Some(sub)) => build_set_parameter(sub)?,
        ("get-param", Some(sub)) => build_get_parameter(sub)?,
        ("update-tle", Some(sub)) => build_update_tle(sub)?,
        ("transmit", Some(sub)) => build_transmit(sub)?,
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            return Ok(());
        }
    };

    let response = send_packet(host, port, &pkt).await?;
    println!("{} {}", "response:".bright_white(), response.trim().bright_cyan());
    Ok(())
}

fn callsign_bytes() -> [u8; CALLSIGN_FIELD_LEN] {
    let mut out = [0u8; CALLSIGN_FIELD_LEN];
    let src = GROUND_CALLSIGN.as_bytes();
    let n = src.len().min(CALLSIGN_FIELD_LEN);
    out[..n].copy_from_slice(&src[..n]);
    out
}

fn payload_id_byte(name: &str) -> Result<u8, Box<dyn std::error::Error>> {
    match name {
        "edc-a" => Ok(0),
        "edc-b" => Ok(1),
        "payload-x" => Ok(2),
        other => Err(format!("unknown payload {other}").into()),
    }
}

fn param_id_byte(name: &str) -> Result<u8, Box<dyn std::error::Error>> {
    match name {
        "mode" => Ok(0),
        "main-edc" => Ok(1),
        "manual-mode" => Ok(2),
        "system-time" => Ok(3),
        "px-duration-ms" => Ok(4),
        other => Err(format!("unknown parameter {other}").into()),
    }
}

fn build_ping() -> Vec<u8> {
    let mut pkt = vec![tc_id::PING];
    pkt.extend_from_slice(&callsign_bytes());
    pkt
}

fn build_unparameterized(packet_id: u8, key: &[u8]) -> Vec<u8> {
    let mut pkt = vec![packet_id];
    pkt.extend_from_slice(&callsign_bytes());
    append_hmac(&mut pkt, key);
    pkt
}

fn build_hibernate(sub: &ArgMatches) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let hours: u16 = sub.value_of("hours").unwrap().parse()?;
    let mut pkt = vec![tc_id::ENTER_HIBERNATION];
    pkt.extend_from_slice(&callsign_bytes());
    pkt.extend_from_slice(&hours.to_be_bytes());
    append_hmac(&mut pkt, tc_key::ENTER_HIBERNATION);
    Ok(pkt)
}

fn build_module(packet_id: u8, key: &[u8], sub: &ArgMatches) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let module_id: u8 = sub.value_of("module-id").unwrap().parse()?;
    let mut pkt = vec![packet_id];
    pkt.extend_from_slice(&callsign_bytes());
    pkt.push(module_id);
    append_hmac(&mut pkt, key);
    Ok(pkt)
}

fn build_payload_command(packet_id: u8, key: &[u8], sub: &ArgMatches) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let payload_id = payload_id_byte(sub.value_of("payload").unwrap())?;
    let mut pkt = vec![packet_id];
    pkt.extend_from_slice(&callsign_bytes());
    pkt.push(payload_id);
    append_hmac(&mut pkt, key);
    Ok(pkt)
}

fn build_data_request(sub: &ArgMatches) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let data_id: u8 = sub.value_of("data-id").unwrap().parse()?;
    let start: u32 = sub.value_of("start").unwrap().parse()?;
    let end: u32 = sub.value_of("end").unwrap().parse()?;

    let mut pkt = vec![tc_id::DATA_REQUEST];
    pkt.extend_from_slice(&callsign_bytes());
    pkt.push(data_id);
    pkt.extend_from_slice(&start.to_be_bytes());
    pkt.extend_from_slice(&end.to_be_bytes());
    append_hmac(&mut pkt, tc_key::DATA_REQUEST);
    Ok(pkt)
}

fn build_get_payload_data(sub: &ArgMatches) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let payload_id = payload_id_byte(sub.value_of("payload").unwrap())?;
    let offset: u32 = sub.value_of("offset").unwrap().parse()?;

    let mut pkt = vec![tc_id::GET_PAYLOAD_DATA];
    pkt.extend_from_slice(&callsign_bytes());
    pkt.push(payload_id);
    pkt.extend_from_slice(&offset.to_be_bytes());
    append_hmac(&mut pkt, tc_key::GET_PAYLOAD_DATA);
    Ok(pkt)
}

fn build_set_parameter(sub: &ArgMatches) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let param = param_id_byte(sub.value_of("param").unwrap())?;
    let value: u32 = sub.value_of("value").unwrap().parse()?;

    let mut pkt = vec![tc_id::SET_PARAMETER];
    pkt.extend_from_slice(&callsign_bytes());
    pkt.push(0); // subsystem: OBDH is the only one this simulator models
    pkt.push(param);
    pkt.extend_from_slice(&value.to_be_bytes());
    append_hmac(&mut pkt, tc_key::SET_PARAMETER);
    Ok(pkt)
}

fn build_get_parameter(sub: &ArgMatches) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let param = param_id_byte(sub.value_of("param").unwrap())?;

    let mut pkt = vec![tc_id::GET_PARAMETER];
    pkt.extend_from_slice(&callsign_bytes());
    pkt.push(0);
    pkt.push(param);
    append_hmac(&mut pkt, tc_key::GET_PARAMETER);
    Ok(pkt)
}

fn build_update_tle(sub: &ArgMatches) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let line_number: u8 = sub.value_of("line-number").unwrap().parse()?;
    let line = sub.value_of("line").unwrap();
    if line.len() != 69 {
        return Err(format!("TLE line must be exactly 69 characters, got {}", line.len()).into());
    }

    let mut pkt = vec![tc_id::UPDATE_TLE];
    pkt.extend_from_slice(&callsign_bytes());
    pkt.push(line_number);
    pkt.extend_from_slice(line.as_bytes());
    append_hmac(&mut pkt, tc_key::UPDATE_TLE);
    Ok(pkt)
}

fn build_transmit(sub: &ArgMatches) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let payload = hex_decode(sub.value_of("hex-payload").unwrap()).map_err(|()| "invalid hex payload")?;
    let mut pkt = vec![tc_id::TRANSMIT_PACKET];
    pkt.extend_from_slice(&callsign_bytes());
    pkt.extend_from_slice(&payload);
    Ok(pkt)
}

fn append_hmac(pkt: &mut Vec<u8>, key: &[u8]) {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(pkt);
    let tag = mac.finalize().into_bytes();
    debug_assert_eq!(tag.len(), HMAC_TAG_LEN);
    pkt.extend_from_slice(&tag);
}

/// Wraps `pkt` in an SPP `Command` frame, sends it hex-encoded over one
/// TCP line, and unwraps the SPP `Tx` frame the server answers with.
async fn send_packet(host: &str, port: u16, pkt: &[u8]) -> Result<String, Box<dyn std::error::Error>> {
    let stream = TcpStream::connect((host, port)).await?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let frame = spp::encode(SppType::Command, pkt);
    let hex_line = hex_encode(&frame);
    writer.write_all(hex_line.as_bytes()).await?;
    writer.write_all(b"\n").await?;

    let mut response = String::new();
    reader.read_line(&mut response).await?;

    let raw = hex_decode(response.trim()).map_err(|()| "server sent malformed hex")?;
    let (decoded, _) = spp::decode(&raw)?;
    Ok(String::from_utf8_lossy(&decoded.payload).into_owned())
}

/// Connects and prints every `BEACON <hex>` line the server streams,
/// decoded from its SPP `Tx` framing.
async fn run_monitor(host: &str, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let stream = TcpStream::connect((host, port)).await?;
    let (reader, _writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    println!("{}", "monitoring beacon frames, ctrl-c to stop".bright_white());
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }
        let Some(hex_part) = line.trim().strip_prefix("BEACON ") else {
            continue;
        };
        match hex_decode(hex_part).ok().and_then(|raw| spp::decode(&raw).ok()) {
            Some((frame, _)) => println!("{} {}", "beacon:".green(), hex_encode(&frame.payload)),
            None => println!("{}", "malformed beacon frame received".red()),
        }
    }
    Ok(())
}

/// Spawns the sibling `obdh-sim` binary as a detached ground-test harness
/// process, so an operator can bring up the simulator from the same CLI.
fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "starting obdh-sim...".bright_white());
    let status = Command::new("obdh-sim").status()?;
    if !status.success() {
        return Err(format!("obdh-sim exited with {status}").into());
    }
    Ok(())
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
