use command_protocol::payload::Netconf;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum EmulationError {
    #[error("Invalid {0} percentage: {1}.")]
    InvalidPercentage(&'static str, f64),
    #[error("Invalid rate '{0}'.")]
    InvalidRate(String),
    #[error("Invalid mac address '{0}'.")]
    InvalidMacAddress(String),
}

fn percentage(name: &'static str, value: f64) -> Result<Option<String>, EmulationError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(EmulationError::InvalidPercentage(name, value));
    }
    Ok((value > 0.0).then(|| format!("{}%", value)))
}

fn valid_rate(rate: &str) -> bool {
    rate.starts_with(|c: char| c.is_ascii_digit())
        && rate.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
}

fn valid_mac_address(mac: &str) -> bool {
    let octets: Vec<&str> = mac.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Arguments following `netem` for the given impairment. Empty when the
/// netconf asks for no impairment at all.
pub fn netem_arguments(netconf: &Netconf) -> Result<Vec<String>, EmulationError> {
    let mut args = vec![];
    if netconf.limit > 0 {
        args.extend([String::from("limit"), netconf.limit.to_string()]);
    }
    if netconf.delay > 0 {
        args.extend([String::from("delay"), format!("{}us", netconf.delay)]);
    }
    for (name, value) in [
        ("loss", netconf.loss),
        ("duplicate", netconf.duplicate),
        ("corrupt", netconf.corrupt),
        ("reorder", netconf.reorder),
    ] {
        if let Some(value) = percentage(name, value)? {
            args.extend([name.to_string(), value]);
        }
    }
    if !netconf.rate.is_empty() {
        if !valid_rate(&netconf.rate) {
            return Err(EmulationError::InvalidRate(netconf.rate.clone()));
        }
        args.extend([String::from("rate"), netconf.rate.clone()]);
    }
    Ok(args)
}

/// Shell script run by the sidecar. It finds the interface carrying
/// `mac_address` and replaces its root qdisc, or deletes it when no
/// impairment is requested.
pub fn netem_script(netconf: &Netconf, mac_address: &str) -> Result<String, EmulationError> {
    let mac_address = mac_address.to_ascii_lowercase();
    if !valid_mac_address(&mac_address) {
        return Err(EmulationError::InvalidMacAddress(mac_address));
    }
    let find_interface = format!(
        "IFACE=''; for dev in /sys/class/net/*; do \
         if [ \"$(cat $dev/address)\" = \"{}\" ]; then IFACE=$(basename $dev); fi; done; \
         [ -n \"$IFACE\" ] || exit 3",
        mac_address
    );

    let args = netem_arguments(netconf)?;
    let tc = if args.is_empty() {
        String::from("tc qdisc del dev \"$IFACE\" root 2>/dev/null || true")
    } else {
        format!("tc qdisc replace dev \"$IFACE\" root netem {}", args.join(" "))
    };
    Ok(format!("{}; {}", find_interface, tc))
}

#[cfg(test)]
mod test {
    use super::*;
    use parameterized::parameterized;

    fn create_netconf() -> Netconf {
        Netconf {
            container: "node0".to_string(),
            network: "testnet".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn no_impairment() {
        assert_eq!(netem_arguments(&create_netconf()), Ok(vec![]));
    }

    #[test]
    fn full_impairment() {
        let netconf = Netconf {
            limit: 1000,
            loss: 1.5,
            delay: 100000,
            rate: "100mbit".to_string(),
            duplicate: 2.0,
            corrupt: 0.1,
            reorder: 25.0,
            ..create_netconf()
        };
        assert_eq!(
            netem_arguments(&netconf).unwrap().join(" "),
            "limit 1000 delay 100000us loss 1.5% duplicate 2% corrupt 0.1% reorder 25% rate 100mbit"
        );
    }

    #[parameterized(loss = {-1.0, 100.5})]
    fn invalid_loss(loss: f64) {
        let netconf = Netconf {
            loss,
            ..create_netconf()
        };
        assert_eq!(
            netem_arguments(&netconf),
            Err(EmulationError::InvalidPercentage("loss", loss))
        );
    }

    #[parameterized(rate = {"1mbit; reboot", "fast", "$(id)"})]
    fn invalid_rate(rate: &str) {
        let netconf = Netconf {
            rate: rate.to_string(),
            ..create_netconf()
        };
        assert_eq!(
            netem_arguments(&netconf),
            Err(EmulationError::InvalidRate(rate.to_string()))
        );
    }

    #[test]
    fn script_replaces_qdisc() {
        let netconf = Netconf {
            delay: 100000,
            ..create_netconf()
        };
        let script = netem_script(&netconf, "02:42:AC:11:00:02").unwrap();
        assert!(script.contains("= \"02:42:ac:11:00:02\""));
        assert!(script.ends_with("tc qdisc replace dev \"$IFACE\" root netem delay 100000us"));
    }

    #[test]
    fn script_clears_qdisc() {
        let script = netem_script(&create_netconf(), "02:42:ac:11:00:02").unwrap();
        assert!(script.ends_with("tc qdisc del dev \"$IFACE\" root 2>/dev/null || true"));
    }

    #[parameterized(mac = {"", "02:42:ac:11:00", "zz:42:ac:11:00:02", "02:42:ac:11:00:02;"})]
    fn script_invalid_mac(mac: &str) {
        assert!(matches!(
            netem_script(&create_netconf(), mac),
            Err(EmulationError::InvalidMacAddress(_))
        ));
    }
}
