#![forbid(unsafe_code)]

use trustgate_contracts::identity::{BotVerdict, IdentificationEvent, SignalVerdict};

/// How a bot verdict of `Unknown` (ambiguous or absent data, as opposed to a
/// positively unrecognized token) is classified. Deployments disagree on
/// this, so it is a policy parameter rather than a constant; `Bad` and
/// unrecognized tokens always flag regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownBotVerdictPolicy {
    Flag,
    Pass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskConfig {
    pub unknown_bot_verdict: UnknownBotVerdictPolicy,
}

impl RiskConfig {
    pub fn mvp_v1() -> Self {
        Self {
            unknown_bot_verdict: UnknownBotVerdictPolicy::Flag,
        }
    }
}

/// Named risk contributions, in the fixed order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskSignal {
    Bot,
    IpBlocklist,
    VirtualMachine,
    Tor,
}

impl RiskSignal {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bot => "bot",
            Self::IpBlocklist => "ip_blocklist",
            Self::VirtualMachine => "virtual_machine",
            Self::Tor => "tor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskResult {
    Clear,
    Flagged { signals: Vec<RiskSignal> },
}

impl RiskResult {
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::Flagged { .. })
    }
}

/// Classifies the auxiliary signals on a trusted identification event into
/// one pass/fail outcome. Contributions are combined by OR; an absent
/// licensed signal contributes nothing (not evaluated is not the same as
/// clear). No side effects.
#[derive(Debug, Clone, Copy)]
pub struct RiskSignalEvaluator {
    config: RiskConfig,
}

impl RiskSignalEvaluator {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, event: &IdentificationEvent) -> RiskResult {
        let mut flagged = Vec::new();
        if self.bot_flags(event.bot) {
            flagged.push(RiskSignal::Bot);
        }
        let licensed = [
            (RiskSignal::IpBlocklist, event.ip_blocklist),
            (RiskSignal::VirtualMachine, event.virtual_machine),
            (RiskSignal::Tor, event.tor),
        ];
        for (signal, verdict) in licensed {
            if verdict == Some(SignalVerdict::Detected) {
                flagged.push(signal);
            }
        }
        if flagged.is_empty() {
            RiskResult::Clear
        } else {
            RiskResult::Flagged { signals: flagged }
        }
    }

    fn bot_flags(&self, verdict: BotVerdict) -> bool {
        match verdict {
            BotVerdict::NotDetected => false,
            BotVerdict::Bad | BotVerdict::Unrecognized => true,
            BotVerdict::Unknown => {
                self.config.unknown_bot_verdict == UnknownBotVerdictPolicy::Flag
            }
        }
    }
}
