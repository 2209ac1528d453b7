//! Alert card construction.
//!
//! Turns a restart that passed the mute gate into a `TeamsMessage`.

use crate::mute::MuteDecision;
use crate::tracker::RestartObservation;
use teams_client::{THEME_COLOR_CRITICAL, THEME_COLOR_INFO, THEME_COLOR_WARNING, TeamsMessage};

/// Restarts since the previous alert for this container.
///
/// Falls back to the tracker delta on the first alert, or when the counter
/// was reset since the previous alert.
pub fn restarts_since_last_alert(observation: &RestartObservation, decision: &MuteDecision, tracker_delta: u32) -> u32 {
    match decision {
        MuteDecision::Repeat { previous } if observation.restart_count >= previous.last_notified_restart_count => {
            observation.restart_count - previous.last_notified_restart_count
        }
        _ => tracker_delta,
    }
}

/// Build the card for a container restart.
///
/// Amber for the first alert on a container, red once it has been alerted on
/// before and is still restarting.
pub fn restart_alert(
    cluster_name: &str,
    observation: &RestartObservation,
    decision: &MuteDecision,
    tracker_delta: u32,
) -> TeamsMessage {
    let key = &observation.key;
    let since_last = restarts_since_last_alert(observation, decision, tracker_delta);

    let summary = format!(
        "[{}] Container {} in pod {}/{} restarted ({} total, +{} since last alert)",
        cluster_name,
        key.container,
        key.namespace(),
        key.pod_name(),
        observation.restart_count,
        since_last,
    );

    let mut text = format!(
        "**Cluster:** {cluster_name}\n\n\
         **Namespace:** {namespace}\n\n\
         **Pod:** {pod}\n\n\
         **Container:** {container}\n\n\
         **Restart count:** {count} (+{since_last} since last alert)\n\n",
        namespace = key.namespace(),
        pod = key.pod_name(),
        container = key.container,
        count = observation.restart_count,
    );
    if let Some(termination) = &observation.last_termination {
        let reason = termination.reason.as_deref().unwrap_or("Unknown");
        text.push_str(&format!(
            "**Last termination:** {reason} (exit code {})\n\n",
            termination.exit_code
        ));
    }
    if let MuteDecision::Repeat { previous } = decision {
        text.push_str(&format!(
            "**Previous alert:** {}\n\n",
            previous.last_notified_at.to_rfc3339()
        ));
    }
    text.push_str(&format!("**Observed at:** {}", observation.observed_at.to_rfc3339()));

    let theme_color = match decision {
        MuteDecision::Repeat { .. } => THEME_COLOR_CRITICAL,
        _ => THEME_COLOR_WARNING,
    };

    TeamsMessage::new(summary, text, theme_color)
}

/// Notice posted once when the alerter starts.
pub fn startup_notice(cluster_name: &str, mute_seconds: u64) -> TeamsMessage {
    TeamsMessage::new(
        format!("[{cluster_name}] Pod restart alerter started"),
        format!(
            "Watching pods in cluster **{cluster_name}** for container restarts. \
             Repeat alerts for the same container are muted for {mute_seconds}s."
        ),
        THEME_COLOR_INFO,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ContainerKey;
    use crate::mute::MuteEntry;
    use crate::tracker::Termination;
    use chrono::{DateTime, Utc};

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + seconds, 0).unwrap_or_default()
    }

    fn observation(count: u32) -> RestartObservation {
        RestartObservation {
            key: ContainerKey::new("payments", "api-7d9f", "server"),
            restart_count: count,
            observed_at: at(60),
            last_termination: Some(Termination {
                reason: Some("OOMKilled".to_string()),
                exit_code: 137,
            }),
        }
    }

    #[test]
    fn test_first_alert_is_amber() {
        let msg = restart_alert("prod", &observation(3), &MuteDecision::First, 1);

        assert_eq!(msg.theme_color, THEME_COLOR_WARNING);
        assert_eq!(
            msg.summary,
            "[prod] Container server in pod payments/api-7d9f restarted (3 total, +1 since last alert)"
        );
        assert!(msg.text.contains("**Namespace:** payments"));
        assert!(msg.text.contains("**Last termination:** OOMKilled (exit code 137)"));
        assert!(!msg.text.contains("Previous alert"));
    }

    #[test]
    fn test_repeat_alert_is_red_and_counts_from_last_alert() {
        let decision = MuteDecision::Repeat {
            previous: MuteEntry {
                last_notified_at: at(0),
                last_notified_restart_count: 3,
            },
        };
        let msg = restart_alert("prod", &observation(7), &decision, 1);

        assert_eq!(msg.theme_color, THEME_COLOR_CRITICAL);
        assert!(msg.summary.contains("(7 total, +4 since last alert)"));
        assert!(msg.text.contains(&format!("**Previous alert:** {}", at(0).to_rfc3339())));
    }

    #[test]
    fn test_counter_reset_since_last_alert_uses_tracker_delta() {
        let decision = MuteDecision::Repeat {
            previous: MuteEntry {
                last_notified_at: at(0),
                last_notified_restart_count: 9,
            },
        };
        assert_eq!(restarts_since_last_alert(&observation(2), &decision, 2), 2);
    }

    #[test]
    fn test_alert_body_layout() {
        let msg = restart_alert("prod", &observation(3), &MuteDecision::First, 1);
        assert_eq!(
            msg.text,
            format!(
                "**Cluster:** prod\n\n\
                 **Namespace:** payments\n\n\
                 **Pod:** api-7d9f\n\n\
                 **Container:** server\n\n\
                 **Restart count:** 3 (+1 since last alert)\n\n\
                 **Last termination:** OOMKilled (exit code 137)\n\n\
                 **Observed at:** {}",
                at(60).to_rfc3339()
            )
        );
    }

    #[test]
    fn test_missing_termination_is_omitted() {
        let mut obs = observation(1);
        obs.last_termination = None;
        let msg = restart_alert("dev", &obs, &MuteDecision::First, 1);
        assert!(!msg.text.contains("Last termination"));
    }

    #[test]
    fn test_startup_notice() {
        let msg = startup_notice("prod", 300);
        assert_eq!(msg.theme_color, THEME_COLOR_INFO);
        assert_eq!(msg.summary, "[prod] Pod restart alerter started");
        assert!(msg.text.contains("300s"));
    }
}
