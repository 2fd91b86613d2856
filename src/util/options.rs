use crate::util::constants::BYTES_IN_MBYTE;
use std::default::Default;
use strum_macros::{Display, EnumString};

/// Which trigger strategy the young (or the only, when not generational) heuristics use.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum HeuristicsSelector {
    Adaptive,
    Static,
    Compact,
    Aggressive,
}

/// The default minimum old generation size: below this, old growth never triggers a cycle.
pub const DEFAULT_MIN_OLD_GEN_SIZE: usize = 16 * BYTES_IN_MBYTE;

fn always_valid<T>(_: &T) -> bool {
    true
}

fn is_percentage(v: &usize) -> bool {
    *v <= 100
}

fn is_positive_f64(v: &f64) -> bool {
    v.is_finite() && *v > 0.0
}

macro_rules! options {
    ($($(#[$outer:meta])* $name:ident: $type:ty[$validator:expr] = $default:expr),*,) => [
        options!($($(#[$outer])* $name: $type[$validator] = $default),*);
    ];
    ($($(#[$outer:meta])* $name:ident: $type:ty[$validator:expr] = $default:expr),*) => [
        /// Tuning parameters of the control plane.  None of them is a correctness requirement.
        #[derive(Clone, Debug)]
        pub struct Options {
            $($(#[$outer])* pub $name: $type),*
        }
        impl Options {
            /// Parse `val` for the option `s` and set it if the value passes validation.
            /// Returns `false` if the key is unknown, or the value cannot be parsed or is invalid.
            pub fn set_from_str(&mut self, s: &str, val: &str) -> bool {
                match s {
                    // Parse the given value from str (by env vars or by the builder) to the right type
                    $(stringify!($name) => if let Ok(ref val) = val.parse::<$type>() {
                        // Validate
                        let validate_fn = $validator;
                        let is_valid = validate_fn(val);
                        if is_valid {
                            // Only set value if valid.
                            self.$name = val.clone();
                        } else {
                            warn!("Unable to set {}={:?}. Invalid value. Default value will be used.", s, val);
                        }
                        is_valid
                    } else {
                        warn!("Unable to set {}={:?}. Can't parse value. Default value will be used.", s, val);
                        false
                    })*
                    _ => {
                        warn!("Unknown option {}", s);
                        false
                    }
                }
            }
        }
        impl Default for Options {
            fn default() -> Self {
                let mut options = Options {
                    $($name: $default),*
                };

                // If we have env vars that start with GC_CONTROL_ and match any option (such as
                // GC_CONTROL_HEURISTICS), we set the option to its value (if it is a valid value).
                // Otherwise, use the default value.
                const PREFIX: &str = "GC_CONTROL_";
                for (key, val) in std::env::vars() {
                    // strip the prefix, and get the lower case string
                    if let Some(rest_of_key) = key.strip_prefix(PREFIX) {
                        let lowercase: &str = &rest_of_key.to_lowercase();
                        match lowercase {
                            $(stringify!($name) => { options.set_from_str(lowercase, &val); },)*
                            _ => {}
                        }
                    }
                }
                options
            }
        }
    ]
}

options! {
    /// Manage young, old and global generations instead of a single global generation.
    generational:                     bool               [always_valid] = false,
    /// Trigger strategy of the young/global heuristics.
    heuristics:                       HeuristicsSelector [always_valid] = HeuristicsSelector::Adaptive,
    /// Let a young request interrupt old marking.
    allow_old_marking_preemption:     bool               [always_valid] = true,
    /// Allow degenerated cycles.  Otherwise an allocation failure goes straight to a full GC.
    degenerated_gc:                   bool               [always_valid] = true,
    /// Consecutive degenerated cycles tolerated before the next one is upgraded to a full GC.
    full_gc_threshold:                usize              [always_valid] = 3,
    /// Milliseconds without a cycle after which the global heuristics trigger anyway. 0 disables.
    guaranteed_gc_interval:           u64                [always_valid] = 5 * 60 * 1000,
    /// Starvation bound of the young heuristics, in milliseconds. 0 disables.
    guaranteed_young_gc_interval:     u64                [always_valid] = 5 * 60 * 1000,
    /// Starvation bound of the old heuristics, in milliseconds. 0 disables.
    guaranteed_old_gc_interval:       u64                [always_valid] = 10 * 60 * 1000,
    /// Minimum sleep of the regulator, in milliseconds.
    control_interval_min:             u64                [|v: &u64| *v > 0] = 1,
    /// Maximum sleep of the regulator and idle wait of the controller, in milliseconds.
    control_interval_max:             u64                [|v: &u64| *v > 0] = 10,
    /// Minimum time between two regulator backoff steps, in milliseconds.
    control_interval_adjust_period:   u64                [always_valid] = 1000,
    /// Percentage of capacity. Less free memory than this always triggers.
    min_free_threshold:               usize              [is_percentage] = 10,
    /// Percentage of capacity. Trigger threshold while the heuristics are still learning.
    init_free_threshold:              usize              [is_percentage] = 70,
    /// Number of cycles before the adaptive model is trusted.
    learning_steps:                   usize              [always_valid] = 5,
    /// Percentage of capacity held back for allocation spikes.
    alloc_spike_factor:               usize              [is_percentage] = 5,
    /// Percentage of capacity allocated since the last cycle that triggers the compact heuristics.
    allocation_threshold:             usize              [is_percentage] = 10,
    /// Initial margin of error of the adaptive heuristics, in standard deviations.
    adaptive_initial_confidence:      f64                [is_positive_f64] = 1.8,
    /// Initial spike threshold of the adaptive heuristics, in standard deviations.
    adaptive_initial_spike_threshold: f64                [is_positive_f64] = 1.8,
    /// How often the allocation rate is sampled.
    adaptive_sample_frequency_hz:     usize              [|v: &usize| *v > 0] = 10,
    /// How many seconds of allocation rate samples are kept.
    adaptive_sample_size_seconds:     usize              [|v: &usize| *v > 0] = 10,
    /// Weight of history in the decaying averages of the allocation rate.
    adaptive_decay_factor:            f64                [|v: &f64| *v > 0.0 && *v <= 1.0] = 0.5,
    /// Penalty removed after each successful concurrent cycle.
    concurrent_penalty_recovery:      usize              [always_valid] = 1,
    /// Penalty added after each degenerated cycle.
    degenerated_penalty:              usize              [always_valid] = 10,
    /// Penalty added after each full cycle.  Must be larger than `degenerated_penalty`.
    full_penalty:                     usize              [always_valid] = 20,
    /// Upper bound of the accumulated penalty.
    max_penalty:                      usize              [is_percentage] = 100,
    /// Allow cycles to unload classes.
    class_unloading:                  bool               [always_valid] = true,
    /// Unload classes every Nth global cycle. 0 only unloads on metaspace exhaustion.
    unload_classes_frequency:         usize              [always_valid] = 1,
    /// Drop explicit (user or serviceability) GC requests.
    ignore_system_gc:                 bool               [always_valid] = false,
    /// Run explicit requests as concurrent cycles instead of full ones.
    explicit_gc_invokes_concurrent:   bool               [always_valid] = false,
    /// Run implicit requests as concurrent cycles instead of full ones.
    implicit_gc_invokes_concurrent:   bool               [always_valid] = false,
    /// Clear soft references in every global cycle.
    always_clear_soft_refs:           bool               [always_valid] = false,
    /// Old usage growth over the live size after the last old mark that triggers an old cycle.
    min_old_gen_growth_percent:       f64                [|v: &f64| *v >= 0.0 && *v <= 100.0] = 12.5,
    /// Old usage below which growth never triggers an old cycle, in bytes.
    min_old_gen_size:                 usize              [always_valid] = DEFAULT_MIN_OLD_GEN_SIZE,
    /// Every Nth young or full cycle ages objects.
    aging_cycle_period:               usize              [|v: &usize| *v > 0] = 1,
    /// Periodically ask the heap to uncommit idle memory.
    uncommit:                         bool               [always_valid] = true,
    /// Milliseconds a region stays empty before it is uncommitted.
    uncommit_delay:                   u64                [|v: &u64| *v > 0] = 5 * 60 * 1000,
}

impl Options {
    /// Set options from a string of whitespace separated `key=value` pairs, e.g.
    /// `"heuristics=static full_gc_threshold=5"`.  Returns `true` if every pair was set.
    pub fn set_bulk_from_str(&mut self, options: &str) -> bool {
        let mut all_set = true;
        for pair in options.split_ascii_whitespace() {
            match pair.split_once('=') {
                Some((key, val)) => all_set &= self.set_from_str(key, val),
                None => {
                    warn!("Unable to parse option {:?}. Expecting key=value.", pair);
                    all_set = false;
                }
            }
        }
        all_set
    }

    /// The penalty step of a full cycle.  Always strictly larger than the degenerated step.
    pub fn effective_full_penalty(&self) -> usize {
        if self.full_penalty > self.degenerated_penalty {
            self.full_penalty
        } else {
            self.degenerated_penalty * 2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::options::Options;
    use crate::util::test_util::{serial_test, with_cleanup};

    #[test]
    fn no_env_var() {
        serial_test(|| {
            let options = Options::default();
            assert_eq!(options.heuristics, HeuristicsSelector::Adaptive);
            assert_eq!(options.min_old_gen_size, DEFAULT_MIN_OLD_GEN_SIZE);
            assert!(!options.generational);
        })
    }

    #[test]
    fn with_valid_env_var() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("GC_CONTROL_FULL_GC_THRESHOLD", "7");

                    let options = Options::default();
                    assert_eq!(options.full_gc_threshold, 7);
                },
                || {
                    std::env::remove_var("GC_CONTROL_FULL_GC_THRESHOLD");
                },
            )
        })
    }

    #[test]
    fn with_multiple_valid_env_vars() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("GC_CONTROL_HEURISTICS", "static");
                    std::env::set_var("GC_CONTROL_GENERATIONAL", "true");

                    let options = Options::default();
                    assert_eq!(options.heuristics, HeuristicsSelector::Static);
                    assert!(options.generational);
                },
                || {
                    std::env::remove_var("GC_CONTROL_HEURISTICS");
                    std::env::remove_var("GC_CONTROL_GENERATIONAL");
                },
            )
        })
    }

    #[test]
    fn with_invalid_env_var_value() {
        serial_test(|| {
            with_cleanup(
                || {
                    // invalid value, we cannot parse the value, so use the default value
                    std::env::set_var("GC_CONTROL_FULL_GC_THRESHOLD", "abc");

                    let options = Options::default();
                    assert_eq!(options.full_gc_threshold, 3);
                },
                || {
                    std::env::remove_var("GC_CONTROL_FULL_GC_THRESHOLD");
                },
            )
        })
    }

    #[test]
    fn with_invalid_env_var_key() {
        serial_test(|| {
            with_cleanup(
                || {
                    std::env::set_var("GC_CONTROL_ABC", "42");

                    let options = Options::default();
                    assert_eq!(options.full_gc_threshold, 3);
                },
                || {
                    std::env::remove_var("GC_CONTROL_ABC");
                },
            )
        })
    }

    #[test]
    fn validator_rejects_out_of_range() {
        serial_test(|| {
            let mut options = Options::default();
            assert!(!options.set_from_str("min_free_threshold", "101"));
            assert_eq!(options.min_free_threshold, 10);
            assert!(options.set_from_str("min_free_threshold", "25"));
            assert_eq!(options.min_free_threshold, 25);
            assert!(!options.set_from_str("control_interval_min", "0"));
            assert!(!options.set_from_str("no_such_option", "1"));
        })
    }

    #[test]
    fn set_bulk() {
        serial_test(|| {
            let mut options = Options::default();
            assert!(options.set_bulk_from_str("heuristics=compact  full_gc_threshold=5\tgenerational=true"));
            assert_eq!(options.heuristics, HeuristicsSelector::Compact);
            assert_eq!(options.full_gc_threshold, 5);
            assert!(options.generational);
            assert!(!options.set_bulk_from_str("learning_steps=2 bogus"));
            assert_eq!(options.learning_steps, 2);
        })
    }

    #[test]
    fn full_penalty_is_larger_than_degenerated() {
        serial_test(|| {
            let mut options = Options::default();
            assert_eq!(options.effective_full_penalty(), 20);
            options.set_from_str("full_penalty", "5");
            assert_eq!(options.effective_full_penalty(), 20);
            options.set_from_str("degenerated_penalty", "3");
            assert_eq!(options.effective_full_penalty(), 5);
        })
    }
}
