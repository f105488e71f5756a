use crate::wifi::Error;
use heapless::String;
use numtoa::NumToA;

/// Token acknowledging a successful command
pub(crate) const OK: &str = "OK";

/// Disables command echo
pub(crate) const ECHO_OFF: &str = "ATE0";

/// Sets the WIFI mode to station
pub(crate) const STATION_MODE: &str = "AT+CWMODE=1";

/// Disables joining the stored access point on power-up
pub(crate) const AUTO_CONNECT_OFF: &str = "AT+CWAUTOCONN=0";

/// Leaves the current access point
pub(crate) const DISCONNECT: &str = "AT+CWQAP";

/// Enables transparent transmission mode
pub(crate) const PASSTHROUGH_MODE: &str = "AT+CIPMODE=1";

/// Starts sending data. In transparent mode the link becomes a raw byte pipe afterwards.
pub(crate) const START_SEND: &str = "AT+CIPSEND";

/// Closes the TCP connection
pub(crate) const CLOSE: &str = "AT+CIPCLOSE";

/// Character of the escape sequence leaving transparent mode
pub(crate) const ESCAPE_CHAR: u8 = b'+';

/// Number of escape characters
pub(crate) const ESCAPE_LENGTH: usize = 3;

/// Max. SSID length in bytes
pub(crate) const MAX_SSID_LENGTH: usize = 32;

/// Max. password length in bytes
pub(crate) const MAX_PASSWORD_LENGTH: usize = 63;

/// Capacity of composed commands
pub(crate) const COMMAND_CAPACITY: usize = 256;

/// Buffer for composed commands
pub(crate) type CommandText = String<COMMAND_CAPACITY>;

/// Length of the join command for credentials of max. length, every character escaped
pub(crate) const ACCESS_POINT_CONNECT_MAX_LENGTH: usize =
    "AT+CWJAP=\"\",\"\"".len() + 2 * MAX_SSID_LENGTH + 2 * MAX_PASSWORD_LENGTH;

const _: () = assert!(
    ACCESS_POINT_CONNECT_MAX_LENGTH <= COMMAND_CAPACITY,
    "join command of valid credentials must fit its buffer"
);

/// Command for joining the given access point: `AT+CWJAP="<ssid>","<password>"`
pub(crate) fn access_point_connect(ssid: &str, password: &str) -> Result<CommandText, Error> {
    if ssid.len() > MAX_SSID_LENGTH {
        return Err(Error::InvalidSsidLength);
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(Error::InvalidPasswordLength);
    }

    // Unreachable for validated credentials, see ACCESS_POINT_CONNECT_MAX_LENGTH
    compose_access_point_connect(ssid, password).map_err(|_| Error::GenericFailure)
}

/// Command for opening a TCP connection: `AT+CIPSTART="TCP","<address>",<port>`
pub(crate) fn tcp_connect(address: &str, port: u16) -> Result<CommandText, Error> {
    let mut digits = [0x0; 20];
    let port = port.numtoa_str(10, &mut digits);

    compose_tcp_connect(address, port).map_err(|_| Error::InvalidAddressLength)
}

fn compose_access_point_connect(ssid: &str, password: &str) -> Result<CommandText, ()> {
    let mut command = CommandText::new();
    command.push_str("AT+CWJAP=\"")?;
    push_escaped(&mut command, ssid)?;
    command.push_str("\",\"")?;
    push_escaped(&mut command, password)?;
    command.push('"')?;

    Ok(command)
}

fn compose_tcp_connect(address: &str, port: &str) -> Result<CommandText, ()> {
    let mut command = CommandText::new();
    command.push_str("AT+CIPSTART=\"TCP\",\"")?;
    command.push_str(address)?;
    command.push_str("\",")?;
    command.push_str(port)?;

    Ok(command)
}

/// Appends a string argument, escaping the characters ESP-AT treats as syntax (`\`, `"` and `,`)
fn push_escaped(command: &mut CommandText, value: &str) -> Result<(), ()> {
    for c in value.chars() {
        if matches!(c, '\\' | '"' | ',') {
            command.push('\\')?;
        }
        command.push(c)?;
    }

    Ok(())
}
