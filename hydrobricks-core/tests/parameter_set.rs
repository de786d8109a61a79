//! Behaviour of the parameter registry, the constraints and the sampler through the
//! public API.

use hydrobricks_core::config::{dump_config_file, load_config_file, FileType, ParameterTree};
use hydrobricks_core::sampler::{Sampler, MAX_REDRAWS};
use hydrobricks_core::{HBError, ParameterSet, ParameterSpec, ParameterValue};
use is_close::is_close;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A Socont-like parameter set.
fn socont() -> ParameterSet {
    let mut parameters = ParameterSet::new();
    parameters
        .define(
            ParameterSpec::new("snowpack", "degree_day_factor")
                .unit("mm/d/°C")
                .aliases(["a_snow", "ddf_snow"])
                .range(0.0, 12.0),
        )
        .unwrap();
    parameters
        .define(
            ParameterSpec::new("snowpack", "melting_temperature")
                .unit("°C")
                .alias("melt_t_snow")
                .range(0.0, 5.0)
                .default_value(0.0)
                .mandatory(false),
        )
        .unwrap();
    parameters
        .define(
            ParameterSpec::new("glacier", "degree_day_factor")
                .alias("a_ice")
                .range(vec![5.0, 5.0], vec![20.0, 20.0]),
        )
        .unwrap();
    parameters
        .define(
            ParameterSpec::new("slow_reservoir", "capacity")
                .alias("A")
                .range(10.0, 3000.0),
        )
        .unwrap();
    parameters
        .define(
            ParameterSpec::new("slow_reservoir", "response_factor")
                .alias("k_slow")
                .range(0.001, 1.0),
        )
        .unwrap();
    parameters
        .define_data_parameter(
            "precip_corr_factor",
            Some(1.0.into()),
            Some(0.7.into()),
            Some(1.3.into()),
            None,
        )
        .unwrap();
    parameters
}

mod registry {
    use super::*;

    #[test]
    fn key_and_aliases_resolve_to_the_same_value() {
        let mut parameters = socont();
        parameters
            .set_values([
                ("a_snow", ParameterValue::from(3.0)),
                ("a_ice", ParameterValue::from(vec![7.0, 8.0])),
                ("A", ParameterValue::from(200.0)),
                ("k_slow", ParameterValue::from(0.05)),
            ])
            .unwrap();

        for definition in parameters.iter() {
            let by_key = parameters.get(&definition.key()).unwrap();
            for alias in &definition.aliases {
                assert_eq!(parameters.get(alias).unwrap(), by_key);
            }
        }
    }

    #[test]
    fn shared_alias_rejected() {
        let mut parameters = socont();
        let before = parameters.len();
        let res = parameters
            .define(ParameterSpec::new("glacier", "melting_temperature").alias("k_slow"));
        assert!(matches!(res, Err(HBError::DuplicateAlias(alias)) if alias == "k_slow"));
        assert_eq!(parameters.len(), before);
        assert!(!parameters.has("glacier:melting_temperature"));
    }

    #[test]
    fn inverted_bounds_rejected() {
        let mut parameters = socont();
        let before = parameters.len();
        let res = parameters
            .define(ParameterSpec::new("surface_runoff", "runoff_coef").range(2.0, 1.0));
        assert!(matches!(res, Err(HBError::RangeConsistency(_))));
        assert_eq!(parameters.len(), before);
    }

    #[test]
    fn snow_scenario() {
        let mut parameters = ParameterSet::new();
        parameters
            .define(ParameterSpec::new("snow", "k_snow").alias("k_snow").range(0.0, 10.0))
            .unwrap();

        let res = parameters.set_values([("k_snow", 15.0)]);
        assert!(matches!(
            res,
            Err(HBError::RangeViolation { side: "above", bound: "maximum", .. })
        ));
        parameters.set_values([("k_snow", 5.0)]).unwrap();
        assert_eq!(parameters.get("k_snow").unwrap(), Some(&ParameterValue::Scalar(5.0)));
        assert_eq!(parameters.get("snow:k_snow").unwrap(), Some(&ParameterValue::Scalar(5.0)));
    }

    #[test]
    fn rejected_batch_changes_nothing() {
        let mut parameters = socont();
        parameters.set_values([("A", 100.0), ("k_slow", 0.1)]).unwrap();

        let res = parameters.set_values([("A", 150.0), ("k_slow", 2.0)]);
        assert!(res.is_err());
        assert_eq!(parameters.get("A").unwrap().unwrap().as_scalar(), Some(100.0));
        assert_eq!(parameters.get("k_slow").unwrap().unwrap().as_scalar(), Some(0.1));
    }
}

mod configuration {
    use super::*;

    fn assigned() -> ParameterSet {
        let mut parameters = socont();
        parameters
            .set_values([
                ("a_snow", ParameterValue::from(3.0)),
                ("a_ice", ParameterValue::from(vec![7.0, 8.0])),
                ("A", ParameterValue::from(200.0)),
            ])
            .unwrap();
        parameters
    }

    #[test]
    fn export_and_rebuild_preserves_the_model_table() {
        let parameters = assigned();
        let rebuilt = ParameterSet::from_config(&parameters.export_by_component()).unwrap();
        assert_eq!(rebuilt.model_parameters(), parameters.model_parameters());
        assert!(rebuilt.is_for_forcing("precip_corr_factor").unwrap());
    }

    #[test]
    fn round_trip_through_files() {
        let parameters = assigned();
        let dir = std::env::temp_dir().join(format!("hydrobricks-it-{}", std::process::id()));

        let mut written =
            dump_config_file(&parameters.export_by_component(), &dir, "parameters", FileType::Both)
                .unwrap();
        written.extend(
            dump_config_file(&parameters.export_by_component(), &dir, "parameters", FileType::Toml)
                .unwrap(),
        );
        assert_eq!(written.len(), 3);

        for path in &written {
            let tree: ParameterTree = load_config_file(path).unwrap();
            let rebuilt = ParameterSet::from_config(&tree).unwrap();
            let original: Vec<_> = parameters
                .model_parameters()
                .into_iter()
                .filter(|p| p.value.is_some())
                .collect();
            let restored: Vec<_> = rebuilt
                .model_parameters()
                .into_iter()
                .filter(|p| p.value.is_some())
                .collect();
            assert_eq!(original, restored, "{}", path.display());

            // The values can also be applied back onto the original definitions
            let mut target = socont();
            target.apply_config(&tree).unwrap();
            assert_eq!(target.get("a_ice").unwrap(), parameters.get("a_ice").unwrap());
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

mod sampling {
    use super::*;

    #[test]
    fn unconstrained_draws_stay_in_bounds() {
        let mut parameters = socont();
        let mut rng = ChaCha8Rng::seed_from_u64(2023);
        for _ in 0..10_000 {
            let drawn = parameters.set_random_values(&["k_slow"], &mut rng).unwrap();
            let value = drawn["k_slow"].as_scalar().unwrap();
            assert!((0.001..=1.0).contains(&value));
        }
    }

    #[test]
    fn ordered_reservoirs() {
        let mut parameters = ParameterSet::new();
        for (component, alias) in [("slow_reservoir", "k_slow_1"), ("slow_reservoir_2", "k_slow_2")] {
            parameters
                .define(
                    ParameterSpec::new(component, "response_factor")
                        .alias(alias)
                        .range(0.0, 1.0),
                )
                .unwrap();
        }
        parameters.define_constraint("k_slow_1", "<=", "k_slow_2").unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..1000 {
            let drawn = parameters
                .set_random_values(&["k_slow_1", "k_slow_2"], &mut rng)
                .unwrap();
            let k1 = drawn["k_slow_1"].as_scalar().unwrap();
            let k2 = drawn["k_slow_2"].as_scalar().unwrap();
            assert!(k1 <= k2);
            assert!(parameters.are_constraints_satisfied().unwrap());
        }
    }

    #[test]
    fn rare_satisfying_draws_terminate() {
        // A > B with A in [0, 1] and B in [0.995, 1]: roughly 0.25% of the draws succeed
        let mut parameters = ParameterSet::new();
        parameters
            .define(ParameterSpec::new("x", "a").alias("A").range(0.0, 1.0))
            .unwrap();
        parameters
            .define(ParameterSpec::new("x", "b").alias("B").range(0.995, 1.0))
            .unwrap();
        parameters.define_constraint("A", ">", "B").unwrap();

        let mut rng = ChaCha8Rng::seed_from_u64(99);
        for _ in 0..20 {
            match parameters.set_random_values(&["A", "B"], &mut rng) {
                Ok(drawn) => {
                    assert!(drawn["A"].as_scalar() > drawn["B"].as_scalar());
                }
                Err(HBError::ConstraintUnsatisfiable { attempts }) => {
                    assert_eq!(attempts, MAX_REDRAWS + 1);
                }
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
    }

    #[test]
    fn vector_draws_respect_element_bounds() {
        let mut parameters = ParameterSet::new();
        parameters
            .define(
                ParameterSpec::new("glacier", "degree_day_factor")
                    .range(vec![1.0, 10.0, 100.0], vec![2.0, 20.0, 200.0]),
            )
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let sampler = Sampler::new();
        for _ in 0..100 {
            let drawn = sampler
                .sample(&mut parameters, &["glacier:degree_day_factor"], &mut rng)
                .unwrap();
            let values = drawn["glacier:degree_day_factor"].as_vector().unwrap().to_vec();
            assert!((1.0..=2.0).contains(&values[0]));
            assert!((10.0..=20.0).contains(&values[1]));
            assert!((100.0..=200.0).contains(&values[2]));
        }
    }

    #[test]
    fn data_parameters_can_be_sampled() {
        let mut parameters = socont();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let drawn = parameters
            .set_random_values(&["precip_corr_factor"], &mut rng)
            .unwrap();
        let value = drawn["precip_corr_factor"].as_scalar().unwrap();
        assert!((0.7..=1.3).contains(&value));
        assert!(is_close!(
            parameters.get("data:precip_corr_factor").unwrap().unwrap().as_scalar().unwrap(),
            value
        ));
    }
}
