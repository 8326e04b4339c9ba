// stklib test application -- CLI tool for exercising the CAT encoders and
// the dispatch engine without a modem.
//
// Usage:
//   stklib-test-app terminal-response --number 1 --type SELECT_ITEM --item 3
//   stklib-test-app terminal-response --number 2 --type GET_INPUT --text hello --packed
//   stklib-test-app terminal-response --number 4 --type GET_INKEY \
//       --result NO_RESPONSE_FROM_USER --duration 10
//   stklib-test-app menu-selection 2 --help-requested
//   stklib-test-app event-download IDLE_SCREEN_AVAILABLE
//   stklib-test-app event-download BROWSER_TERMINATION --added-info 00
//   stklib-test-app list results
//   stklib-test-app -v demo --language de

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use stklib::cat::envelope::{encode_event_download, encode_menu_selection};
use stklib::cat::response::{OptionalTags, ResponseData, encode_terminal_response};
use stklib::cat::tlv::to_hex;
use stklib::{
    CatCmdMessage, CatEvent, CatResponseMessage, CatService, CatServiceBuilder, CommandDetails,
    CommandParams, CommandPayload, CommandType, ComprehensionTag, DeviceIdentity, Duration,
    EventCode, Input, Item, LANGUAGE_SETTING, Menu, RefreshResult, ResultCode, TextMessage,
    TimeUnit,
};
use stklib_test_harness::{MockRil, RilLog, RilRequest};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// stklib test application -- encodes toolkit messages and replays a
/// scripted session against a mock RIL.
#[derive(Parser)]
#[command(name = "stklib-test-app", version, about)]
struct Cli {
    /// Log protocol decisions (same as RUST_LOG=debug).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a TERMINAL RESPONSE and print it as hex.
    TerminalResponse {
        /// Command number assigned by the card.
        #[arg(long, default_value_t = 1)]
        number: u8,

        /// Command type name (e.g. SELECT_ITEM) or hex value (e.g. 0x24).
        #[arg(long = "type")]
        command_type: String,

        /// Command qualifier (hex).
        #[arg(long, default_value = "00", value_parser = parse_hex_u8)]
        qualifier: u8,

        /// Result code name or hex value.
        #[arg(long, default_value = "OK")]
        result: String,

        /// Additional-information byte for the RESULT object (hex).
        #[arg(long, value_parser = parse_hex_u8)]
        additional_info: Option<u8>,

        /// Encode the COMMAND DETAILS tag without the comprehension-required bit.
        #[arg(long)]
        no_cr: bool,

        /// SELECT ITEM: chosen item identifier.
        #[arg(long, conflicts_with_all = ["text", "yes_no"])]
        item: Option<u8>,

        /// GET INPUT / GET INKEY: text entered by the user.
        #[arg(long, conflicts_with = "yes_no")]
        text: Option<String>,

        /// GET INKEY yes/no answer.
        #[arg(long, value_enum)]
        yes_no: Option<YesNo>,

        /// Encode --text as UCS2.
        #[arg(long, requires = "text")]
        ucs2: bool,

        /// Encode --text as packed GSM 7-bit.
        #[arg(long, requires = "text", conflicts_with = "ucs2")]
        packed: bool,

        /// GET INKEY variable timeout (in the command's time unit) to echo
        /// back on NO_RESPONSE_FROM_USER.
        #[arg(long)]
        duration: Option<u8>,

        /// PROVIDE LOCAL INFORMATION language code.
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// Encode a MENU SELECTION envelope and print it as hex.
    MenuSelection {
        /// Item identifier picked from the main menu.
        item: u8,

        /// Ask the card for help on the item instead of selecting it.
        #[arg(long)]
        help_requested: bool,
    },

    /// Encode an EVENT DOWNLOAD envelope and print it as hex.
    EventDownload {
        /// Event name (e.g. IDLE_SCREEN_AVAILABLE) or hex value.
        event: String,

        /// Source device; defaults to DISPLAY for idle screen, TERMINAL
        /// otherwise.
        #[arg(long)]
        source: Option<String>,

        /// Event-specific bytes appended after the event header (hex).
        #[arg(long, default_value = "")]
        added_info: String,
    },

    /// List the wire vocabulary.
    List {
        #[arg(value_enum)]
        table: Table,
    },

    /// Replay a scripted proactive session through the engine and print
    /// every host event and outbound RIL request.
    Demo {
        /// Language reported for PROVIDE LOCAL INFORMATION.
        #[arg(long, default_value = "en")]
        language: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum YesNo {
    Yes,
    No,
}

#[derive(Clone, Copy, ValueEnum)]
enum Table {
    Commands,
    Results,
    Events,
    Tags,
    Devices,
}

// ---------------------------------------------------------------------------
// Argument parsing helpers
// ---------------------------------------------------------------------------

/// Parse a hex string like "0x98" or "98" into a u8.
fn parse_hex_u8(s: &str) -> std::result::Result<u8, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(s, 16).map_err(|e| format!("invalid hex byte: {e}"))
}

/// Resolve a symbol by name (case-insensitive, `-` accepted for `_`) or by
/// hex wire value.
fn lookup<T: Copy>(
    kind: &str,
    input: &str,
    all: &[T],
    name: impl Fn(T) -> &'static str,
    from_value: impl Fn(u8) -> Option<T>,
) -> Result<T> {
    let wanted = input.replace('-', "_");
    if let Some(found) = all.iter().copied().find(|&t| name(t).eq_ignore_ascii_case(&wanted)) {
        return Ok(found);
    }
    match parse_hex_u8(input) {
        Ok(value) => {
            from_value(value).with_context(|| format!("unknown {kind} value 0x{value:02X}"))
        }
        Err(_) => bail!("unknown {kind} '{input}'"),
    }
}

fn parse_command_type(s: &str) -> Result<CommandType> {
    lookup("command type", s, CommandType::ALL, CommandType::name, CommandType::from_value)
}

fn parse_result(s: &str) -> Result<ResultCode> {
    lookup("result code", s, ResultCode::ALL, ResultCode::name, ResultCode::from_value)
}

fn parse_event(s: &str) -> Result<EventCode> {
    lookup("event", s, EventCode::ALL, EventCode::name, EventCode::from_value)
}

fn parse_device(s: &str) -> Result<DeviceIdentity> {
    lookup(
        "device identity",
        s,
        DeviceIdentity::ALL,
        DeviceIdentity::name,
        DeviceIdentity::from_value,
    )
}

// ---------------------------------------------------------------------------
// Encoder commands
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn cmd_terminal_response(
    number: u8,
    command_type: &str,
    qualifier: u8,
    result: &str,
    additional_info: Option<u8>,
    no_cr: bool,
    item: Option<u8>,
    text: Option<&str>,
    yes_no: Option<YesNo>,
    ucs2: bool,
    packed: bool,
    duration: Option<u8>,
    language: &str,
) -> Result<()> {
    let command_type = parse_command_type(command_type)?;
    let result = parse_result(result)?;
    let details =
        CommandDetails::new(number, command_type, qualifier).comprehension_required(!no_cr);

    let data = match (item, text, yes_no) {
        (Some(id), _, _) => Some(ResponseData::SelectItem { id }),
        (_, Some(text), _) => Some(ResponseData::GetInput {
            text: text.to_string(),
            ucs2,
            packed,
        }),
        (_, _, Some(answer)) => Some(ResponseData::YesNo(matches!(answer, YesNo::Yes))),
        _ => None,
    };

    let input = Input {
        duration: duration.map(|time_interval| Duration {
            time_unit: TimeUnit::Second,
            time_interval,
        }),
        ..Input::default()
    };
    let optional = OptionalTags {
        input: Some(&input),
        language: Some(language),
    };

    let bytes =
        encode_terminal_response(&details, result, additional_info, data.as_ref(), optional)?;
    debug!(details = %details, result = %result, len = bytes.len(), "encoded terminal response");
    println!("{}", to_hex(&bytes));
    Ok(())
}

fn cmd_menu_selection(item: u8, help_requested: bool) -> Result<()> {
    let bytes = encode_menu_selection(item, help_requested)?;
    println!("{}", to_hex(&bytes));
    Ok(())
}

fn cmd_event_download(event: &str, source: Option<&str>, added_info: &str) -> Result<()> {
    let event = parse_event(event)?;
    let source = match source {
        Some(s) => parse_device(s)?,
        None if event == EventCode::IdleScreenAvailable => DeviceIdentity::Display,
        None => DeviceIdentity::Terminal,
    };
    let added = hex::decode(added_info).context("--added-info must be hex")?;
    if !EventCode::is_supported(event.value()) {
        info!(event = %event, "event is not in the supported set; encoding anyway");
    }

    let bytes = encode_event_download(
        event.value(),
        source.value(),
        DeviceIdentity::Uicc.value(),
        &added,
    )?;
    println!("{}", to_hex(&bytes));
    Ok(())
}

fn cmd_list(table: Table) -> Result<()> {
    fn print_all<T: Copy>(all: &[T], value: impl Fn(T) -> u8, name: impl Fn(T) -> &'static str) {
        for &t in all {
            println!("  0x{:02X}  {}", value(t), name(t));
        }
    }

    match table {
        Table::Commands => print_all(CommandType::ALL, CommandType::value, CommandType::name),
        Table::Results => print_all(ResultCode::ALL, ResultCode::value, ResultCode::name),
        Table::Events => {
            for &event in EventCode::ALL {
                let marker = if EventCode::is_supported(event.value()) { "*" } else { " " };
                println!("{marker} 0x{:02X}  {}", event.value(), event.name());
            }
            println!("(* = reported through event download)");
        }
        Table::Tags => print_all(
            ComprehensionTag::ALL,
            ComprehensionTag::value,
            ComprehensionTag::name,
        ),
        Table::Devices => print_all(
            DeviceIdentity::ALL,
            DeviceIdentity::value,
            DeviceIdentity::name,
        ),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scripted session
// ---------------------------------------------------------------------------

/// Prints RIL requests as they appear in the mock's log.
struct Printer {
    log: RilLog,
    seen: usize,
}

impl Printer {
    /// Wait for the engine to drain, then print everything new.
    async fn flush(&mut self, service: &CatService) -> Result<()> {
        service.state().await?;
        let requests = self.log.requests();
        for request in &requests[self.seen..] {
            match request {
                RilRequest::TerminalResponse(hex) => println!("  -> TERMINAL RESPONSE {hex}"),
                RilRequest::Envelope(hex) => println!("  -> ENVELOPE          {hex}"),
                RilRequest::CallSetup(accept) => println!("  -> CALL SETUP        accept={accept}"),
                RilRequest::ServiceRunning => println!("  -> STK SERVICE RUNNING"),
            }
        }
        self.seen = requests.len();
        Ok(())
    }
}

/// Wait for the next forwarded command, printing the other events on the way.
async fn next_command(
    events: &mut tokio::sync::broadcast::Receiver<CatEvent>,
) -> Result<CatCmdMessage> {
    loop {
        match events.recv().await.context("event channel closed")? {
            CatEvent::ProactiveCommand(cmd) => {
                println!("  <- host event: {}", cmd.details);
                return Ok(cmd);
            }
            other => println!("  <- host event: {other:?}"),
        }
    }
}

fn params(
    number: u8,
    command_type: CommandType,
    qualifier: u8,
    payload: CommandPayload,
) -> CommandParams {
    CommandParams::new(CommandDetails::new(number, command_type, qualifier), payload)
}

async fn cmd_demo(language: &str) -> Result<()> {
    let ril = MockRil::new();
    let mut printer = Printer {
        log: ril.log(),
        seen: 0,
    };
    let service = CatServiceBuilder::new()
        .language(language)
        .build_with_transport(Box::new(ril))
        .await?;
    let mut events = service.subscribe();
    printer.flush(&service).await?;

    println!("SET UP MENU");
    let menu = Menu::with_items(
        Some("Operator".into()),
        vec![Item::new(1, "Balance"), Item::new(2, "Top up"), Item::new(3, "Settings")],
    );
    service
        .handle_proactive_command(params(1, CommandType::SetUpMenu, 0, CommandPayload::Menu(menu)))
        .await?;
    let setup_menu = next_command(&mut events).await?;
    printer.flush(&service).await?;

    println!("user picks 'Top up'");
    service
        .send_response(
            CatResponseMessage::for_command(&setup_menu, ResultCode::Ok).menu_selection(2),
        )
        .await?;
    printer.flush(&service).await?;

    println!("SELECT ITEM");
    let amounts = Menu::with_items(
        Some("Amount".into()),
        vec![Item::new(1, "5"), Item::new(2, "10"), Item::new(3, "20")],
    );
    service
        .handle_proactive_command(params(
            2,
            CommandType::SelectItem,
            0,
            CommandPayload::Menu(amounts),
        ))
        .await?;
    let select = next_command(&mut events).await?;
    service
        .send_response(CatResponseMessage::for_command(&select, ResultCode::Ok).menu_selection(3))
        .await?;
    printer.flush(&service).await?;

    println!("GET INPUT (packed)");
    let input = Input {
        text: "Voucher code".into(),
        packed: true,
        min_len: 1,
        max_len: 16,
        ..Input::default()
    };
    service
        .handle_proactive_command(params(
            3,
            CommandType::GetInput,
            0x08,
            CommandPayload::Input(input),
        ))
        .await?;
    let get_input = next_command(&mut events).await?;
    service
        .send_response(CatResponseMessage::for_command(&get_input, ResultCode::Ok).input("hello"))
        .await?;
    printer.flush(&service).await?;

    println!("GET INKEY (times out)");
    let inkey = Input {
        text: "Confirm?".into(),
        yes_no: true,
        duration: Some(Duration {
            time_unit: TimeUnit::Second,
            time_interval: 30,
        }),
        ..Input::default()
    };
    service
        .handle_proactive_command(params(
            4,
            CommandType::GetInkey,
            0x04,
            CommandPayload::Input(inkey),
        ))
        .await?;
    let get_inkey = next_command(&mut events).await?;
    service
        .send_response(CatResponseMessage::for_command(&get_inkey, ResultCode::NoResponseFromUser))
        .await?;
    printer.flush(&service).await?;

    println!("stale answer to the GET INKEY (dropped)");
    service
        .send_response(CatResponseMessage::for_command(&get_inkey, ResultCode::Ok).yes_no(true))
        .await?;
    printer.flush(&service).await?;

    println!("DISPLAY TEXT (immediate response)");
    let text = TextMessage {
        text: Some("Top up successful".into()),
        ..TextMessage::default()
    };
    service
        .handle_proactive_command(params(
            5,
            CommandType::DisplayText,
            0x81,
            CommandPayload::Text(text),
        ))
        .await?;
    next_command(&mut events).await?;
    printer.flush(&service).await?;

    println!("PROVIDE LOCAL INFORMATION (language)");
    service
        .handle_proactive_command(params(
            6,
            CommandType::ProvideLocalInformation,
            LANGUAGE_SETTING,
            CommandPayload::None,
        ))
        .await?;
    printer.flush(&service).await?;

    println!("SET UP EVENT LIST");
    service
        .handle_proactive_command(params(
            7,
            CommandType::SetUpEventList,
            0,
            CommandPayload::EventList(vec![
                EventCode::IdleScreenAvailable.value(),
                EventCode::BrowserTermination.value(),
            ]),
        ))
        .await?;
    let event_list = next_command(&mut events).await?;
    printer.flush(&service).await?;

    println!("idle screen becomes available");
    service
        .send_response(
            CatResponseMessage::for_command(&event_list, ResultCode::Ok)
                .event(EventCode::IdleScreenAvailable, &[]),
        )
        .await?;
    printer.flush(&service).await?;

    println!("session end");
    service.session_end().await?;
    printer.flush(&service).await?;
    println!("  outstanding: {:?}", service.state().await?.outstanding.map(|d| d.to_string()));

    println!("card reset");
    service.icc_refresh(RefreshResult::Reset).await?;
    printer.flush(&service).await?;
    while let Ok(event) = events.try_recv() {
        println!("  <- host event: {event:?}");
    }

    service.shutdown().await?;
    info!("demo finished");
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Command::TerminalResponse {
            number,
            command_type,
            qualifier,
            result,
            additional_info,
            no_cr,
            item,
            text,
            yes_no,
            ucs2,
            packed,
            duration,
            language,
        } => cmd_terminal_response(
            *number,
            command_type,
            *qualifier,
            result,
            *additional_info,
            *no_cr,
            *item,
            text.as_deref(),
            *yes_no,
            *ucs2,
            *packed,
            *duration,
            language,
        ),
        Command::MenuSelection {
            item,
            help_requested,
        } => cmd_menu_selection(*item, *help_requested),
        Command::EventDownload {
            event,
            source,
            added_info,
        } => cmd_event_download(event, source.as_deref(), added_info),
        Command::List { table } => cmd_list(*table),
        Command::Demo { language } => cmd_demo(language).await,
    }
}
