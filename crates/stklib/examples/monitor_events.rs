//! Monitor host notifications from a CAT service.
//!
//! Runs a short scripted proactive session against a mock RIL and prints
//! every notification the host application would see, answering the
//! prompts the way a simple UI would. The card-bound traffic recorded by
//! the mock is dumped at the end.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p stklib --example monitor_events
//! ```

use std::time::Duration;

use stklib::{
    CatEvent, CatResponseMessage, CatService, CatServiceBuilder, CommandDetails, CommandParams,
    CommandPayload, CommandType, Item, Menu, ResultCode, TextMessage,
};
use stklib_test_harness::MockRil;
use tokio::sync::broadcast;
use tokio::time::Instant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ril = MockRil::new();
    let log = ril.log();

    let service = CatServiceBuilder::new()
        .language("en")
        .build_with_transport(Box::new(ril))
        .await?;
    let mut events = service.subscribe();
    let start = Instant::now();

    println!("{:<12} Event", "Timestamp");
    println!("{:-<12} {:-<50}", "", "");

    let main_menu = CommandDetails::new(1, CommandType::SetUpMenu, 0);
    service
        .handle_proactive_command(CommandParams::new(
            main_menu,
            CommandPayload::Menu(Menu::with_items(
                Some("Services".into()),
                vec![Item::new(1, "Balance"), Item::new(2, "Top up")],
            )),
        ))
        .await?;
    pump(&service, &mut events, start).await?;

    // The user opens "Top up" from the idle screen.
    service
        .send_response(CatResponseMessage::new(main_menu, ResultCode::Ok).menu_selection(2))
        .await?;

    service
        .handle_proactive_command(CommandParams::new(
            CommandDetails::new(2, CommandType::SelectItem, 0),
            CommandPayload::Menu(Menu::with_items(
                Some("Amount".into()),
                vec![Item::new(1, "5"), Item::new(2, "10")],
            )),
        ))
        .await?;
    pump(&service, &mut events, start).await?;

    service
        .handle_proactive_command(CommandParams::new(
            CommandDetails::new(3, CommandType::DisplayText, 0x81),
            CommandPayload::Text(TextMessage {
                text: Some("Top up successful".into()),
                response_needed: true,
                ..TextMessage::default()
            }),
        ))
        .await?;
    pump(&service, &mut events, start).await?;

    service.session_end().await?;
    pump(&service, &mut events, start).await?;

    println!("\nCard-bound traffic:");
    for request in log.requests() {
        println!("  {request:?}");
    }

    service.shutdown().await?;
    Ok(())
}

/// Print and answer notifications until the stream goes quiet.
async fn pump(
    service: &CatService,
    events: &mut broadcast::Receiver<CatEvent>,
    start: Instant,
) -> anyhow::Result<()> {
    loop {
        let event = match tokio::time::timeout(Duration::from_millis(200), events.recv()).await {
            Ok(Ok(event)) => event,
            Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                println!("(missed {n} events)");
                continue;
            }
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => break,
        };

        let elapsed = start.elapsed();
        let timestamp = format!("{:>6}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis());

        match event {
            CatEvent::ProactiveCommand(cmd) => {
                println!("{timestamp} command {}", cmd.details);
                let answer = match cmd.command_type() {
                    Some(CommandType::SelectItem) => {
                        let first = cmd.menu().and_then(|m| m.items.iter().flatten().next());
                        first.map(|item| {
                            println!("{:>12} user picks '{}'", "", item.text);
                            CatResponseMessage::for_command(&cmd, ResultCode::Ok)
                                .menu_selection(item.id)
                        })
                    }
                    Some(CommandType::DisplayText)
                        if cmd.text_message().is_some_and(|t| t.response_needed) =>
                    {
                        println!("{:>12} user dismisses the text", "");
                        Some(CatResponseMessage::for_command(&cmd, ResultCode::Ok))
                    }
                    _ => None,
                };
                if let Some(answer) = answer {
                    service.send_response(answer).await?;
                }
            }
            CatEvent::SessionEnded => println!("{timestamp} session ended"),
            CatEvent::IccStatusChanged {
                card_present,
                refresh_result,
            } => {
                println!("{timestamp} card present={card_present} refresh={refresh_result:?}");
            }
        }
    }

    // Everything answered above has reached the engine.
    service.state().await?;
    Ok(())
}
