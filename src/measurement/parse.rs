//! Extraction of numbers from `iperf` and `ping` text output.

use crate::error::ProbeError;

/// Throughput in Mbit/s: the last number directly followed by a `…bits/sec` unit token.
pub fn bandwidth(output: &str) -> Result<f64, ProbeError> {
    let tokens: Vec<&str> = output.split_whitespace().collect();
    tokens
        .windows(2)
        .rev()
        .find_map(|pair| {
            let scale = rate_scale(pair[1])?;
            pair[0].parse::<f64>().ok().map(|value| value * scale)
        })
        .ok_or_else(|| parse_error("bandwidth", output))
}

/// Jitter in ms: the last number directly followed by an `ms` token.
pub fn jitter(output: &str) -> Result<f64, ProbeError> {
    let tokens: Vec<&str> = output.split_whitespace().collect();
    tokens
        .windows(2)
        .rev()
        .find_map(|pair| match pair[1] {
            "ms" => pair[0].parse::<f64>().ok(),
            _ => None,
        })
        .ok_or_else(|| parse_error("jitter", output))
}

/// Average round-trip time in ms from a `min/avg/max[/mdev] = a/b/c[/d] ms` summary line.
pub fn latency(output: &str) -> Result<f64, ProbeError> {
    output
        .lines()
        .rev()
        .filter(|line| line.contains("min/avg/max"))
        .find_map(|line| {
            let (_, stats) = line.split_once('=')?;
            stats.trim().split('/').nth(1)?.trim().parse::<f64>().ok()
        })
        .ok_or_else(|| parse_error("latency", output))
}

fn rate_scale(unit: &str) -> Option<f64> {
    match unit {
        "bits/sec" => Some(1e-6),
        "Kbits/sec" => Some(1e-3),
        "Mbits/sec" => Some(1.0),
        "Gbits/sec" => Some(1e3),
        _ => None,
    }
}

fn parse_error(metric: &'static str, output: &str) -> ProbeError {
    ProbeError::Parse {
        metric,
        output: output.to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const IPERF_TCP: &str = "\
------------------------------------------------------------
Client connecting to 10.0.0.3, TCP port 5001
TCP window size: 85.0 KByte (default)
------------------------------------------------------------
[  3] local 10.0.0.1 port 40214 connected with 10.0.0.3 port 5001
[ ID] Interval       Transfer     Bandwidth
[  3]  0.0- 5.0 sec  5.62 MBytes  9.41 Mbits/sec
";

    const IPERF_UDP: &str = "\
------------------------------------------------------------
Client connecting to 10.0.0.3, UDP port 5001
Sending 1470 byte datagrams, IPG target: 11215.21 us (kalman adjust)
UDP buffer size:  208 KByte (default)
------------------------------------------------------------
[  3] local 10.0.0.1 port 51622 connected with 10.0.0.3 port 5001
[ ID] Interval       Transfer     Bandwidth
[  3]  0.0- 5.0 sec   642 KBytes  1.05 Mbits/sec
[  3] Sent 447 datagrams
[  3] Server Report:
[  3]  0.0- 5.0 sec   642 KBytes  1.05 Mbits/sec   0.021 ms    0/  447 (0%)
";

    const PING: &str = "\
PING 10.0.0.3 (10.0.0.3) 56(84) bytes of data.
64 bytes from 10.0.0.3: icmp_seq=1 ttl=64 time=0.101 ms
64 bytes from 10.0.0.3: icmp_seq=2 ttl=64 time=0.054 ms

--- 10.0.0.3 ping statistics ---
5 packets transmitted, 5 received, 0% packet loss, time 4081ms
rtt min/avg/max/mdev = 0.045/0.067/0.101/0.019 ms
";

    #[test]
    fn tcp_bandwidth() {
        assert_approx_eq!(bandwidth(IPERF_TCP).unwrap(), 9.41);
    }

    #[test]
    fn bandwidth_units_are_normalized() {
        assert_approx_eq!(bandwidth("[  3] 0.0-5.0 sec 1.2 GBytes 2.05 Gbits/sec").unwrap(), 2050.0);
        assert_approx_eq!(bandwidth("[  3] 0.0-5.0 sec 512 KBytes 820 Kbits/sec").unwrap(), 0.82);
    }

    #[test]
    fn bandwidth_prefers_last_report() {
        let output = "[ 3] 0.0-1.0 sec 1 MBytes 8.00 Mbits/sec\n[ 3] 0.0-5.0 sec 6 MBytes 9.50 Mbits/sec\n";
        assert_approx_eq!(bandwidth(output).unwrap(), 9.5);
    }

    #[test]
    fn bandwidth_failure_keeps_raw_output() {
        let output = "connect failed: Connection refused";
        match bandwidth(output) {
            Err(ProbeError::Parse { metric, output: raw }) => {
                assert_eq!(metric, "bandwidth");
                assert_eq!(raw, output);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(bandwidth("").is_err());
        assert!(bandwidth("nan-ish Mbits/sec").is_err());
    }

    #[test]
    fn udp_jitter_from_server_report() {
        assert_approx_eq!(jitter(IPERF_UDP).unwrap(), 0.021);
    }

    #[test]
    fn jitter_is_not_fooled_by_datagrams() {
        let no_report = "\
Sending 1470 byte datagrams, IPG target: 11215.21 us (kalman adjust)
[  3] Sent 447 datagrams
[  3] WARNING: did not receive ack of last datagram after 10 tries.
";
        assert!(jitter(no_report).is_err());
    }

    #[test]
    fn ping_average() {
        assert_approx_eq!(latency(PING).unwrap(), 0.067);
        assert_approx_eq!(
            latency("round-trip min/avg/max = 0.1/0.25/0.4 ms").unwrap(),
            0.25
        );
    }

    #[test]
    fn ping_without_summary() {
        let unreachable = "\
PING 10.0.0.3 (10.0.0.3) 56(84) bytes of data.
From 10.0.0.1 icmp_seq=1 Destination Host Unreachable

--- 10.0.0.3 ping statistics ---
5 packets transmitted, 0 received, +5 errors, 100% packet loss, time 4077ms
";
        assert!(latency(unreachable).is_err());
    }
}
