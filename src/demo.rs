//! A small subscription flow used by `screenflow simulate` and the
//! integration tests.

use crate::app::App;
use crate::flow::Flow;
use crate::interrupt::FlowResult;

pub const FLOW_NAME: &str = "subscribe";
pub const ACTION: &str = "main";

const TERMS: &str = "Terms: your plan renews every month until cancelled. \
Charges are taken from your airtime balance on the renewal date. \
You can cancel at any time by dialling the service code and choosing Cancel. \
Refunds are not given for partial months. Do you accept?";

pub fn flow() -> Flow {
    Flow::new(FLOW_NAME).action(ACTION, subscribe)
}

fn subscribe(app: &mut App<'_>) -> FlowResult {
    let name: String = app.screen("name", |prompt| {
        prompt
            .ask("Welcome! What is your name?")
            .transform(|name| name.trim().to_string())
    })?;

    let plan: String = app.screen("plan", |prompt| {
        prompt
            .select(
                format!("Hi {name}, choose a plan"),
                [("basic", "Basic"), ("plus", "Plus"), ("family", "Family")],
            )
            .read()
    })?;

    let age: u8 = app.screen("age", |prompt| {
        prompt
            .ask("How old are you?")
            .parse::<u8>("Please enter your age in years.")
            .validate(|age| (*age < 18).then(|| "You must be 18 or older to subscribe.".to_string()))
            .read()
    })?;

    let accepted: bool = app.screen("terms", |prompt| prompt.yes_no(TERMS))?;
    if !accepted {
        return app.say(format!("No problem, {name}. Nothing was charged."));
    }

    let confirm: String = app.screen("confirm", |prompt| {
        prompt
            .select(
                format!("{name} ({age}), subscribe to {plan}?"),
                [("confirm", "Confirm"), ("change", "Change plan")],
            )
            .read()
    })?;
    if confirm == "change" {
        app.session().delete("plan");
        return app.go_back();
    }

    app.say(format!("Thank you {name}. Your {plan} plan is now active."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_registers_main_action() {
        let flow = flow();
        assert_eq!(flow.name(), FLOW_NAME);
        assert!(flow.has_action(ACTION));
    }
}
