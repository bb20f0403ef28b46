/// Label for a port nobody recognises.
pub const UNKNOWN_SERVICE: &str = "unknown";

/// Map an open port (and whatever banner it sent) to a service label.
///
/// The well-known port table wins; banner fingerprints are only consulted for
/// unmapped ports. Always returns a non-empty label.
pub fn identify(port: u16, banner: &str) -> String {
    well_known_service(port)
        .or_else(|| service_from_banner(banner))
        .unwrap_or(UNKNOWN_SERVICE)
        .to_string()
}

/// Static lookup of canonical service names.
pub fn well_known_service(port: u16) -> Option<&'static str> {
    let name = match port {
        7 => "echo",
        9 => "discard",
        13 => "daytime",
        19 => "chargen",
        20 => "ftp-data",
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        37 => "time",
        43 => "whois",
        49 => "tacacs",
        53 => "domain",
        67 => "bootps",
        68 => "bootpc",
        69 => "tftp",
        70 => "gopher",
        79 => "finger",
        80 => "http",
        88 => "kerberos",
        102 => "iso-tsap",
        109 => "pop2",
        110 => "pop3",
        111 => "rpcbind",
        113 => "ident",
        119 => "nntp",
        123 => "ntp",
        135 => "msrpc",
        137 => "netbios-ns",
        138 => "netbios-dgm",
        139 => "netbios-ssn",
        143 => "imap",
        161 => "snmp",
        162 => "snmptrap",
        179 => "bgp",
        194 => "irc",
        389 => "ldap",
        427 => "svrloc",
        443 => "https",
        444 => "snpp",
        445 => "microsoft-ds",
        464 => "kpasswd",
        465 => "smtps",
        500 => "isakmp",
        512 => "exec",
        513 => "login",
        514 => "shell",
        515 => "printer",
        520 => "route",
        548 => "afp",
        554 => "rtsp",
        587 => "submission",
        593 => "http-rpc-epmap",
        631 => "ipp",
        636 => "ldaps",
        646 => "ldp",
        873 => "rsync",
        902 => "vmware-auth",
        989 => "ftps-data",
        990 => "ftps",
        992 => "telnets",
        993 => "imaps",
        995 => "pop3s",
        1080 => "socks",
        1194 => "openvpn",
        1433 => "mssql",
        1521 => "oracle",
        1723 => "pptp",
        1883 => "mqtt",
        2049 => "nfs",
        2375 => "docker",
        2376 => "docker-tls",
        3000 => "ppp",
        3128 => "squid-http",
        3306 => "mysql",
        3389 => "rdp",
        5000 => "upnp",
        5060 => "sip",
        5432 => "postgresql",
        5672 => "amqp",
        5900 => "vnc",
        5985 => "wsman",
        5986 => "wsmans",
        6379 => "redis",
        6443 => "kubernetes-api",
        8000 => "http-alt",
        8080 => "http-proxy",
        8443 => "https-alt",
        8888 => "sun-answerbook",
        9000 => "cslistener",
        9092 => "kafka",
        9200 => "elasticsearch",
        11211 => "memcached",
        27017 => "mongodb",
        _ => return None,
    };
    Some(name)
}

fn service_from_banner(banner: &str) -> Option<&'static str> {
    let lower = banner.to_ascii_lowercase();
    if banner.starts_with("SSH-") {
        Some("ssh")
    } else if banner.starts_with("HTTP/") {
        Some("http")
    } else if banner.starts_with("RFB ") {
        Some("vnc")
    } else if banner.starts_with("+OK") {
        Some("pop3")
    } else if banner.starts_with("* OK") {
        Some("imap")
    } else if banner.starts_with("220") && (lower.contains("smtp") || lower.contains("mail")) {
        Some("smtp")
    } else if banner.starts_with("220") && lower.contains("ftp") {
        Some("ftp")
    } else if banner.starts_with("-ERR") || banner.starts_with("-NOAUTH") {
        Some("redis")
    } else if lower.contains("mysql") || lower.contains("mariadb") {
        Some("mysql")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_common_ports() {
        for (port, name) in [
            (21, "ftp"),
            (22, "ssh"),
            (25, "smtp"),
            (80, "http"),
            (443, "https"),
            (3306, "mysql"),
            (6379, "redis"),
        ] {
            assert_eq!(identify(port, ""), name);
        }
    }

    #[test]
    fn table_wins_over_banner() {
        assert_eq!(identify(80, "SSH-2.0-OpenSSH_9.6"), "http");
    }

    #[test]
    fn banner_labels_unmapped_ports() {
        assert_eq!(identify(2222, "SSH-2.0-OpenSSH_9.6"), "ssh");
        assert_eq!(identify(8081, "HTTP/1.0 200 OK Server: test"), "http");
        assert_eq!(identify(2121, "220 dummy.ftp FTP Service Ready"), "ftp");
        assert_eq!(identify(2525, "220 mx.example.com ESMTP Postfix"), "smtp");
        assert_eq!(identify(1100, "+OK POP3 ready"), "pop3");
        assert_eq!(identify(5901, "RFB 003.008"), "vnc");
    }

    #[test]
    fn unmapped_and_silent_is_unknown() {
        assert_eq!(identify(40000, ""), UNKNOWN_SERVICE);
        assert_eq!(identify(40000, "garbage"), UNKNOWN_SERVICE);
    }
}
