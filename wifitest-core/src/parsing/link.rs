use crate::structs::LinkInfo;

/// NetworkManager device state code for a fully connected device.
const NM_DEVICE_STATE_ACTIVATED: u32 = 100;

/// Parses `iw dev <interface> link`, e.g.
///
/// ```text
/// Connected to 34:ca:81:49:15:ff (on wlp15s0)
///         SSID: JB_NEW
/// ```
///
/// Both values are optional and independent of each other.
pub fn parse_iw_link(output: &str) -> LinkInfo {
    let mut link = LinkInfo::default();
    for raw_line in output.lines() {
        let line = raw_line.trim();
        if line.to_ascii_lowercase().starts_with("connected to ") {
            if let Some(candidate) = line.split_whitespace().nth(2) {
                let candidate = candidate.to_ascii_lowercase();
                if is_mac(&candidate) {
                    link.bssid = Some(candidate);
                }
            }
        } else if let Some(rest) = line.strip_prefix("SSID:") {
            let ssid = rest.trim();
            if !ssid.is_empty() {
                link.ssid = Some(ssid.to_string());
            }
        }
    }
    link
}

fn is_mac(candidate: &str) -> bool {
    let octets: Vec<&str> = candidate.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

/// 从 `iw dev` 的输出中取第一个 `Interface <name>` 行
pub fn parse_interface_name(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("Interface"))
        .and_then(|line| line.split_whitespace().last())
        .filter(|name| *name != "Interface")
        .map(str::to_string)
}

/// 从 `nmcli -t -f active,ssid dev wifi` 中找到当前活动的 SSID
pub fn parse_active_ssid(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("yes:"))
        .map(|ssid| unescape_terse(ssid.trim_end_matches(['\r', '\n'])))
        .filter(|ssid| !ssid.is_empty())
}

/// Undoes nmcli's terse-mode escaping, where `:` and `\` inside a value
/// are written as `\:` and `\\`.
fn unescape_terse(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}

/// Reads `nmcli -t -f GENERAL.STATE dev show <interface>` output and reports
/// whether the device is up. `30 (disconnected)` must not count as up, so the
/// numeric state code is preferred over substring matching.
pub fn is_link_activated(output: &str) -> bool {
    output.lines().any(|raw_line| {
        let line = raw_line.trim();
        let value = line
            .strip_prefix("GENERAL.STATE:")
            .unwrap_or(line)
            .trim()
            .to_ascii_lowercase();
        let code: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
        match code.parse::<u32>() {
            Ok(code) => code == NM_DEVICE_STATE_ACTIVATED,
            Err(_) => value == "connected" || value == "activated",
        }
    })
}
