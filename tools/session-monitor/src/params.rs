use crate::config::DefaultsConfig;
use crate::errors::MonitorError;
use crate::runtime::EnvMap;
use crate::types::{LogCollectors, SessionParameters};

pub const UNKNOWN_USER: &str = "unknown";

const USER_ENV_KEYS: [&str; 3] = ["USERNAME", "USER", "LOGNAME"];

/// Positional invocation inputs in command-line order. Every field may be
/// missing; the resolver decides what is fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawInputs {
    pub process_name: Option<String>,
    pub testcase_id: Option<String>,
    pub user_name: Option<String>,
    pub log_collectors: Option<String>,
    pub test_domain: Option<String>,
    pub test_name: Option<String>,
}

pub fn current_user(env: &EnvMap) -> String {
    USER_ENV_KEYS
        .iter()
        .filter_map(|key| env.get(*key))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN_USER)
        .to_string()
}

pub fn resolve_parameters(
    inputs: &RawInputs,
    defaults: &DefaultsConfig,
    env: &EnvMap,
) -> Result<SessionParameters, MonitorError> {
    let process_name = present(&inputs.process_name).ok_or(MonitorError::MissingProcessName)?;

    let log_collectors = present(&inputs.log_collectors)
        .map(|csv| LogCollectors::parse_csv(&csv))
        .filter(|collectors| !collectors.is_empty())
        .unwrap_or_else(|| defaults.collectors());

    Ok(SessionParameters {
        process_name,
        testcase_id: present(&inputs.testcase_id)
            .unwrap_or_else(|| defaults.testcase_id.clone()),
        user_name: present(&inputs.user_name).unwrap_or_else(|| current_user(env)),
        log_collectors,
        test_domain: present(&inputs.test_domain),
        test_name: present(&inputs.test_name),
    })
}

// Blank means absent. Anything else is kept byte for byte, padding included.
fn present(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|value| !value.trim().is_empty())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn inputs(values: [&str; 6]) -> RawInputs {
        let field = |value: &str| Some(value.to_string());
        RawInputs {
            process_name: field(values[0]),
            testcase_id: field(values[1]),
            user_name: field(values[2]),
            log_collectors: field(values[3]),
            test_domain: field(values[4]),
            test_name: field(values[5]),
        }
    }

    #[test]
    fn empty_optionals_resolve_to_documented_defaults() {
        let defaults = MonitorConfig::default().defaults;
        let params = resolve_parameters(
            &inputs(["app.exe", "", "", "", "", ""]),
            &defaults,
            &env(&[("USERNAME", "tester")]),
        )
        .expect("resolve");

        assert_eq!(params.process_name, "app.exe");
        assert_eq!(params.testcase_id, "PSPV-TC-10391");
        assert_eq!(params.user_name, "tester");
        assert_eq!(params.log_collectors.render(), "WLAN,PnP,ETL");
        assert_eq!(params.test_domain, None);
        assert_eq!(params.test_name, None);
    }

    #[test]
    fn supplied_values_pass_through() {
        let defaults = MonitorConfig::default().defaults;
        let params = resolve_parameters(
            &inputs(["game.exe", "TC-1", "alice", "ETL,WLAN", "Graphics", "Boot"]),
            &defaults,
            &EnvMap::new(),
        )
        .expect("resolve");

        assert_eq!(params.testcase_id, "TC-1");
        assert_eq!(params.user_name, "alice");
        assert_eq!(params.log_collectors.render(), "ETL,WLAN");
        assert_eq!(params.test_domain.as_deref(), Some("Graphics"));
        assert_eq!(params.test_name.as_deref(), Some("Boot"));
    }

    #[test]
    fn missing_or_blank_process_name_is_fatal() {
        let defaults = MonitorConfig::default().defaults;
        for raw in [RawInputs::default(), inputs(["", "", "", "", "", ""]), inputs(["  ", "TC", "", "", "", ""])] {
            let err = resolve_parameters(&raw, &defaults, &EnvMap::new()).expect_err("fatal");
            assert!(matches!(err, MonitorError::MissingProcessName));
        }
    }

    #[test]
    fn padded_values_are_kept_verbatim() {
        let defaults = MonitorConfig::default().defaults;
        let params = resolve_parameters(
            &inputs([" app.exe ", " TC-1", "alice ", " ETL , WLAN ", "\tGraphics", "Boot "]),
            &defaults,
            &EnvMap::new(),
        )
        .expect("resolve");

        assert_eq!(params.process_name, " app.exe ");
        assert_eq!(params.testcase_id, " TC-1");
        assert_eq!(params.user_name, "alice ");
        assert_eq!(params.log_collectors.render(), "ETL,WLAN");
        assert_eq!(params.test_domain.as_deref(), Some("\tGraphics"));
        assert_eq!(params.test_name.as_deref(), Some("Boot "));
    }

    #[test]
    fn collector_list_of_only_separators_falls_back_to_default() {
        let defaults = MonitorConfig::default().defaults;
        let params = resolve_parameters(
            &inputs(["app.exe", "", "", " , ,", "", ""]),
            &defaults,
            &EnvMap::new(),
        )
        .expect("resolve");
        assert_eq!(params.log_collectors.render(), "WLAN,PnP,ETL");
    }

    #[test]
    fn current_user_checks_env_keys_in_order() {
        assert_eq!(current_user(&env(&[("USER", "bob"), ("LOGNAME", "carol")])), "bob");
        assert_eq!(current_user(&env(&[("USERNAME", " "), ("LOGNAME", "carol")])), "carol");
        assert_eq!(current_user(&EnvMap::new()), UNKNOWN_USER);
    }
}
