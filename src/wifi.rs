//! Wi-Fi station helpers for ESP32 boards, run over the raw REPL.

use crate::error::LinkResult;
use crate::fs::commands::py_str;
use crate::protocol::raw;
use crate::session::SerialSession;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

/// One `(...)` tuple in printed scan output.
static SCAN_TUPLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((.*?)\)").expect("scan tuple pattern is valid"));

const STATION: [&str; 3] = [
    "import network",
    "sta = network.WLAN(network.STA_IF)",
    "sta.active(True)",
];

fn run(link: &mut SerialSession, extra: &[String]) -> LinkResult<String> {
    let mut commands: Vec<String> = STATION.iter().map(|c| c.to_string()).collect();
    commands.extend_from_slice(extra);
    let stdout = raw::execute(link, &commands)?.into_result()?;
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

/// SSIDs of the access points the board can see.
pub fn scan(link: &mut SerialSession) -> LinkResult<Vec<String>> {
    let out = run(link, &["print(sta.scan())".to_string()])?;
    let ssids = parse_scan(&out);
    info!("Found {} access points", ssids.len());
    Ok(ssids)
}

/// Join `ssid` and wait until connected. Returns the printed `ifconfig()`.
pub fn connect(link: &mut SerialSession, ssid: &str, password: &str) -> LinkResult<String> {
    let out = run(
        link,
        &[
            format!("sta.connect({}, {})", py_str(ssid), py_str(password)),
            "while not sta.isconnected():\n pass".to_string(),
            "print(sta.ifconfig())".to_string(),
        ],
    )?;
    info!("Connected to {}", ssid);
    Ok(out.trim().to_string())
}

/// Leave the current network.
pub fn disconnect(link: &mut SerialSession) -> LinkResult<String> {
    let out = run(
        link,
        &[
            "sta.disconnect()".to_string(),
            "while sta.isconnected():\n pass".to_string(),
            "print(sta.ifconfig())".to_string(),
        ],
    )?;
    Ok(out.trim().to_string())
}

/// Pull SSIDs out of a printed `sta.scan()` list of tuples.
pub fn parse_scan(out: &str) -> Vec<String> {
    SCAN_TUPLE
        .captures_iter(out)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().split(',').next())
        .map(|field| {
            field
                .trim()
                .trim_start_matches('b')
                .chars()
                .filter(|c| *c != '\'' && *c != '\\')
                .collect::<String>()
        })
        .collect()
}
