//! Parameter registry.
//!
//! A [`ParameterSet`] owns every [`ParameterDefinition`] of a model, in definition
//! order, plus the [`Constraints`] relating them. Parameters are looked up through an
//! index holding both their canonical key (`component:name`) and their aliases, so
//! callers never hold references into the registry and always go through its API.
//!
//! ```rust
//! use hydrobricks_core::{ParameterSet, ParameterSpec};
//!
//! let mut parameters = ParameterSet::new();
//! parameters
//!     .define(ParameterSpec::new("snow", "k_snow").range(0.0, 10.0))
//!     .unwrap();
//!
//! assert!(parameters.set_values([("snow:k_snow", 15.0)]).is_err());
//! parameters.set_values([("snow:k_snow", 5.0)]).unwrap();
//! assert_eq!(parameters.get("snow:k_snow").unwrap().unwrap().as_scalar(), Some(5.0));
//! ```

mod definition;
mod value;

pub use definition::{ParameterDefinition, ParameterSpec, DATA_COMPONENT};
pub use value::ParameterValue;

use crate::config::ParameterTree;
use crate::constraints::{ComparisonOperator, Constraints, ValueSource};
use crate::errors::{HBError, HBResult};
use crate::sampler::Sampler;
use definition::{canonical_key, check_range_consistency, check_value_range};
use indexmap::IndexMap;
use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entry of the table handed to the simulation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameter {
    pub component: String,
    pub name: String,
    pub value: Option<ParameterValue>,
}

/// Collection of parameter definitions and the constraints between them.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    definitions: Vec<ParameterDefinition>,
    /// Canonical keys and aliases, pointing into `definitions`
    index: HashMap<String, usize>,
    constraints: Constraints,
    allowed_to_change: Vec<String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a new parameter.
    ///
    /// Fails if any alias is already registered, if the canonical key `component:name`
    /// already exists, if the bounds are inconsistent or if the default value falls
    /// outside of them. Nothing is added on failure.
    ///
    /// When the parameter is not mandatory and has a default, its value is initialised
    /// to that default.
    pub fn define(&mut self, spec: ParameterSpec) -> HBResult<()> {
        let key = canonical_key(&spec.component, &spec.name);
        if self.index.contains_key(&key) {
            return Err(HBError::DuplicateParameter(key));
        }

        let mut aliases: Vec<String> = Vec::with_capacity(spec.aliases.len());
        for alias in spec.aliases {
            if self.index.contains_key(&alias) || aliases.contains(&alias) {
                return Err(HBError::DuplicateAlias(alias));
            }
            aliases.push(alias);
        }

        check_range_consistency(&key, spec.min.as_ref(), spec.max.as_ref())?;
        if let Some(default) = &spec.default_value {
            check_value_range(&key, default, spec.min.as_ref(), spec.max.as_ref())?;
        }

        let value = match (spec.mandatory, &spec.default_value) {
            (false, Some(default)) => Some(default.clone()),
            _ => None,
        };

        let position = self.definitions.len();
        self.index.insert(key, position);
        for alias in &aliases {
            self.index.insert(alias.clone(), position);
        }
        self.definitions.push(ParameterDefinition {
            component: spec.component,
            name: spec.name,
            unit: spec.unit,
            aliases,
            value,
            min: spec.min,
            max: spec.max,
            default_value: spec.default_value,
            mandatory: spec.mandatory,
        });
        Ok(())
    }

    /// Define a parameter controlling the spatialization of the forcing.
    ///
    /// The parameter belongs to the `data` component, is not mandatory, and is
    /// reachable by its bare name (registered as its only alias).
    pub fn define_data_parameter(
        &mut self,
        name: &str,
        value: Option<ParameterValue>,
        min: Option<ParameterValue>,
        max: Option<ParameterValue>,
        unit: Option<&str>,
    ) -> HBResult<()> {
        let mut spec = ParameterSpec::new(DATA_COMPONENT, name)
            .alias(name)
            .mandatory(false);
        spec.unit = unit.map(str::to_string);
        spec.min = min;
        spec.max = max;
        spec.default_value = value;
        self.define(spec)
    }

    /// Assign a batch of values, keyed by canonical key or alias.
    ///
    /// The whole batch is validated before anything is committed: if any key is
    /// unknown or any value violates its bounds, no value is changed.
    pub fn set_values<I, K, V>(&mut self, values: I) -> HBResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParameterValue>,
    {
        let mut validated = vec![];
        for (key, value) in values {
            let key = key.as_ref();
            let value = value.into();
            let position = self.resolve(key)?;
            let definition = &self.definitions[position];
            check_value_range(key, &value, definition.min.as_ref(), definition.max.as_ref())?;
            validated.push((position, value));
        }

        for (position, value) in validated {
            self.definitions[position].value = Some(value);
        }
        Ok(())
    }

    /// Assign a single value.
    pub fn set_value(&mut self, key: &str, value: impl Into<ParameterValue>) -> HBResult<()> {
        self.set_values([(key, value.into())])
    }

    /// Current value of a parameter, `None` if it has not been assigned yet.
    pub fn get(&self, key: &str) -> HBResult<Option<&ParameterValue>> {
        Ok(self.definitions[self.resolve(key)?].value.as_ref())
    }

    pub fn get_definition(&self, key: &str) -> HBResult<&ParameterDefinition> {
        Ok(&self.definitions[self.resolve(key)?])
    }

    /// Whether a parameter is reachable by the given key.
    pub fn has(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Whether the parameter controls the forcing spatialization.
    pub fn is_for_forcing(&self, key: &str) -> HBResult<bool> {
        Ok(self.get_definition(key)?.is_for_forcing())
    }

    /// Replace the bounds of a parameter.
    ///
    /// The new bounds must be consistent, but the stored value is not validated
    /// against them: narrowing the range can leave the current value outside of it.
    /// This is reported as a warning only.
    pub fn change_range(
        &mut self,
        key: &str,
        min: Option<ParameterValue>,
        max: Option<ParameterValue>,
    ) -> HBResult<()> {
        let position = self.resolve(key)?;
        check_range_consistency(key, min.as_ref(), max.as_ref())?;

        let definition = &mut self.definitions[position];
        definition.min = min;
        definition.max = max;

        if let Some(value) = &definition.value {
            if let Err(e) =
                check_value_range(key, value, definition.min.as_ref(), definition.max.as_ref())
            {
                warn!("Current value of \"{}\" no longer fits its range: {}", key, e);
            }
        }
        Ok(())
    }

    /// Add a constraint between two parameters (e.g. `k_slow_1 <= k_slow_2`).
    ///
    /// The operator is one of `>`, `>=`, `<`, `<=` or their synonyms `gt`, `ge`, `lt`,
    /// `le`. The parameter names are only resolved when the constraints are evaluated.
    pub fn define_constraint(
        &mut self,
        parameter_1: &str,
        operator: &str,
        parameter_2: &str,
    ) -> HBResult<()> {
        let operator: ComparisonOperator = operator.parse()?;
        self.constraints.add(parameter_1, operator, parameter_2);
        Ok(())
    }

    /// Check the constraints against the current values.
    pub fn are_constraints_satisfied(&self) -> HBResult<bool> {
        self.constraints.all_satisfied(self)
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Draw random values for the given parameters, retrying until the constraints
    /// are satisfied.
    ///
    /// See [`Sampler::sample`].
    pub fn set_random_values<R, S>(
        &mut self,
        keys: &[S],
        rng: &mut R,
    ) -> HBResult<IndexMap<String, ParameterValue>>
    where
        R: Rng + ?Sized,
        S: AsRef<str>,
    {
        Sampler::new().sample(self, keys, rng)
    }

    /// Restrict the parameters a calibration algorithm is allowed to modify.
    pub fn allow_changing<S: AsRef<str>>(&mut self, keys: &[S]) -> HBResult<()> {
        for key in keys {
            self.resolve(key.as_ref())?;
        }
        self.allowed_to_change = keys.iter().map(|k| k.as_ref().to_string()).collect();
        Ok(())
    }

    pub fn allowed_to_change(&self) -> &[String] {
        &self.allowed_to_change
    }

    /// The table handed to the simulation engine.
    ///
    /// Contains every parameter except the `data` ones, in definition order.
    pub fn model_parameters(&self) -> Vec<ModelParameter> {
        self.definitions
            .iter()
            .filter(|d| !d.is_for_forcing())
            .map(|d| ModelParameter {
                component: d.component.clone(),
                name: d.name.clone(),
                value: d.value.clone(),
            })
            .collect()
    }

    /// Group the values by component, in order of first appearance.
    pub fn export_by_component(&self) -> ParameterTree {
        let mut tree = ParameterTree::new();
        for definition in &self.definitions {
            tree.entry(definition.component.clone())
                .or_default()
                .insert(definition.name.clone(), definition.value.clone());
        }
        tree
    }

    /// Rebuild a parameter set from an exported tree.
    ///
    /// Every entry becomes an unbounded parameter holding the exported value. Entries
    /// of the `data` component are restored as data parameters.
    pub fn from_config(tree: &ParameterTree) -> HBResult<Self> {
        let mut parameters = Self::new();
        for (component, values) in tree {
            for (name, value) in values {
                if component == DATA_COMPONENT {
                    parameters.define_data_parameter(name, value.clone(), None, None, None)?;
                    continue;
                }
                parameters.define(ParameterSpec::new(component.as_str(), name.as_str()))?;
                if let Some(value) = value {
                    parameters.set_value(&canonical_key(component, name), value.clone())?;
                }
            }
        }
        Ok(parameters)
    }

    /// Assign the values of an exported tree to the existing definitions.
    ///
    /// Unset entries are ignored. The batch semantics of [`set_values`](Self::set_values)
    /// apply.
    pub fn apply_config(&mut self, tree: &ParameterTree) -> HBResult<()> {
        let values: Vec<(String, ParameterValue)> = tree
            .iter()
            .flat_map(|(component, values)| {
                values.iter().filter_map(move |(name, value)| {
                    value
                        .as_ref()
                        .map(|v| (canonical_key(component, name), v.clone()))
                })
            })
            .collect();
        self.set_values(values)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub(crate) fn resolve(&self, key: &str) -> HBResult<usize> {
        self.index
            .get(key)
            .copied()
            .ok_or_else(|| HBError::NotFound(key.to_string()))
    }

    pub(crate) fn definition_at(&self, position: usize) -> &ParameterDefinition {
        &self.definitions[position]
    }

    /// Store a value without validation, for values already known to fit the bounds.
    pub(crate) fn commit(&mut self, position: usize, value: ParameterValue) {
        self.definitions[position].value = Some(value);
    }
}

impl ValueSource for ParameterSet {
    fn lookup(&self, key: &str) -> HBResult<Option<&ParameterValue>> {
        self.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socont_like() -> ParameterSet {
        let mut parameters = ParameterSet::new();
        parameters
            .define(
                ParameterSpec::new("snowpack", "degree_day_factor")
                    .unit("mm/d/°C")
                    .aliases(["a_snow"])
                    .range(2.0, 12.0),
            )
            .unwrap();
        parameters
            .define(
                ParameterSpec::new("slow_reservoir", "capacity")
                    .unit("mm")
                    .aliases(["A"])
                    .range(10.0, 3000.0)
                    .default_value(200.0)
                    .mandatory(false),
            )
            .unwrap();
        parameters
            .define(
                ParameterSpec::new("surface_runoff", "response_factor")
                    .unit("1/d")
                    .aliases(["k_quick"])
                    .range(0.05, 1.0),
            )
            .unwrap();
        parameters
            .define_data_parameter("precip_corr_factor", Some(1.0.into()), Some(0.7.into()), Some(1.3.into()), Some("-"))
            .unwrap();
        parameters
    }

    #[test]
    fn get_by_key_and_alias() {
        let mut parameters = socont_like();
        parameters.set_value("a_snow", 3.0).unwrap();
        assert_eq!(
            parameters.get("snowpack:degree_day_factor").unwrap(),
            parameters.get("a_snow").unwrap()
        );
        assert_eq!(
            parameters.get("a_snow").unwrap(),
            Some(&ParameterValue::Scalar(3.0))
        );
    }

    #[test]
    fn get_unknown() {
        let parameters = socont_like();
        assert!(matches!(
            parameters.get("unknown"),
            Err(HBError::NotFound(name)) if name == "unknown"
        ));
        // The bare name is not a key
        assert!(parameters.get("capacity").is_err());
    }

    #[test]
    fn mandatory_parameters_start_unset() {
        let parameters = socont_like();
        assert_eq!(parameters.get("a_snow").unwrap(), None);
        assert_eq!(
            parameters.get("A").unwrap(),
            Some(&ParameterValue::Scalar(200.0))
        );
    }

    #[test]
    fn mandatory_with_default_stays_unset() {
        let mut parameters = ParameterSet::new();
        parameters
            .define(ParameterSpec::new("glacier", "melt_factor").default_value(7.0))
            .unwrap();
        assert_eq!(parameters.get("glacier:melt_factor").unwrap(), None);
        assert_eq!(
            parameters
                .get_definition("glacier:melt_factor")
                .unwrap()
                .default_value,
            Some(ParameterValue::Scalar(7.0))
        );
    }

    #[test]
    fn duplicate_alias() {
        let mut parameters = socont_like();
        let res = parameters.define(ParameterSpec::new("glacier", "melt_factor").alias("A"));
        assert!(matches!(res, Err(HBError::DuplicateAlias(alias)) if alias == "A"));
        assert_eq!(parameters.len(), 4);
        assert!(!parameters.has("glacier:melt_factor"));
    }

    #[test]
    fn duplicate_alias_within_definition() {
        let mut parameters = ParameterSet::new();
        let res = parameters.define(ParameterSpec::new("glacier", "melt_factor").aliases(["a", "a"]));
        assert!(matches!(res, Err(HBError::DuplicateAlias(_))));
        assert!(parameters.is_empty());
    }

    #[test]
    fn duplicate_canonical_key() {
        let mut parameters = socont_like();
        let res = parameters.define(ParameterSpec::new("snowpack", "degree_day_factor"));
        assert!(matches!(res, Err(HBError::DuplicateParameter(_))));
        assert_eq!(parameters.len(), 4);
    }

    #[test]
    fn same_name_in_other_component() {
        let mut parameters = socont_like();
        parameters
            .define(ParameterSpec::new("glacier", "degree_day_factor"))
            .unwrap();
        assert_eq!(parameters.len(), 5);
    }

    #[test]
    fn inconsistent_range_not_added() {
        let mut parameters = ParameterSet::new();
        let res = parameters.define(ParameterSpec::new("a", "b").range(2.0, 1.0));
        assert!(matches!(res, Err(HBError::RangeConsistency(_))));
        assert!(parameters.is_empty());
        assert!(!parameters.has("a:b"));
    }

    #[test]
    fn default_outside_range() {
        let mut parameters = ParameterSet::new();
        let res = parameters.define(
            ParameterSpec::new("a", "b")
                .range(0.0, 1.0)
                .default_value(2.0)
                .mandatory(false),
        );
        assert!(matches!(res, Err(HBError::RangeViolation { .. })));
        assert!(parameters.is_empty());
    }

    #[test]
    fn data_parameter() {
        let parameters = socont_like();
        let definition = parameters.get_definition("precip_corr_factor").unwrap();
        assert_eq!(definition.component, DATA_COMPONENT);
        assert_eq!(definition.key(), "data:precip_corr_factor");
        assert!(!definition.mandatory);
        assert_eq!(definition.aliases, vec!["precip_corr_factor".to_string()]);
        assert_eq!(definition.default_value, Some(ParameterValue::Scalar(1.0)));
        assert!(parameters.is_for_forcing("precip_corr_factor").unwrap());
        assert!(!parameters.is_for_forcing("A").unwrap());
    }

    #[test]
    fn set_values_out_of_range_leaves_value_unchanged() {
        let mut parameters = ParameterSet::new();
        parameters
            .define(ParameterSpec::new("snow", "k_snow").alias("k_snow").range(0.0, 10.0))
            .unwrap();

        let res = parameters.set_values([("k_snow", 15.0)]);
        assert!(matches!(res, Err(HBError::RangeViolation { .. })));
        assert_eq!(parameters.get("k_snow").unwrap(), None);

        parameters.set_values([("k_snow", 5.0)]).unwrap();
        assert_eq!(parameters.get("k_snow").unwrap().unwrap().as_scalar(), Some(5.0));

        assert!(parameters.set_values([("k_snow", -0.1)]).is_err());
        assert_eq!(parameters.get("k_snow").unwrap().unwrap().as_scalar(), Some(5.0));
    }

    #[test]
    fn set_values_batch_is_atomic() {
        let mut parameters = socont_like();
        let res = parameters.set_values([("a_snow", 3.0), ("k_quick", 5.0)]);
        assert!(res.is_err());
        assert_eq!(parameters.get("a_snow").unwrap(), None);

        let res = parameters.set_values([("a_snow", 3.0), ("unknown", 0.5)]);
        assert!(matches!(res, Err(HBError::NotFound(_))));
        assert_eq!(parameters.get("a_snow").unwrap(), None);

        parameters
            .set_values([("a_snow", 3.0), ("slow_reservoir:capacity", 300.0)])
            .unwrap();
        assert_eq!(parameters.get("A").unwrap().unwrap().as_scalar(), Some(300.0));
    }

    #[test]
    fn vector_values() {
        let mut parameters = ParameterSet::new();
        parameters
            .define(
                ParameterSpec::new("snowpack", "melt_factor_monthly")
                    .alias("a_snow_m")
                    .range(vec![1.0, 1.0, 2.0], vec![5.0, 5.0, 6.0]),
            )
            .unwrap();

        parameters.set_value("a_snow_m", vec![1.0, 5.0, 2.0]).unwrap();
        let res = parameters.set_value("a_snow_m", vec![1.0, 5.0, 1.0]);
        assert!(matches!(res, Err(HBError::RangeViolation { value, .. }) if value == 1.0));
        let res = parameters.set_value("a_snow_m", 2.0);
        assert!(matches!(res, Err(HBError::ShapeMismatch { .. })));
        assert_eq!(
            parameters.get("a_snow_m").unwrap(),
            Some(&ParameterValue::Vector(vec![1.0, 5.0, 2.0]))
        );
    }

    #[test]
    fn change_range_does_not_revalidate() {
        let mut parameters = socont_like();
        parameters.set_value("a_snow", 10.0).unwrap();
        parameters
            .change_range("a_snow", Some(2.0.into()), Some(5.0.into()))
            .unwrap();

        let definition = parameters.get_definition("a_snow").unwrap();
        assert_eq!(definition.max, Some(ParameterValue::Scalar(5.0)));
        assert_eq!(definition.value, Some(ParameterValue::Scalar(10.0)));

        // New assignments use the new range
        assert!(parameters.set_value("a_snow", 6.0).is_err());
    }

    #[test]
    fn change_range_checks_consistency() {
        let mut parameters = socont_like();
        let res = parameters.change_range("a_snow", Some(5.0.into()), Some(2.0.into()));
        assert!(matches!(res, Err(HBError::RangeConsistency(_))));
        let definition = parameters.get_definition("a_snow").unwrap();
        assert_eq!(definition.min, Some(ParameterValue::Scalar(2.0)));

        let res = parameters.change_range("unknown", None, None);
        assert!(matches!(res, Err(HBError::NotFound(_))));
    }

    #[test]
    fn model_parameters_exclude_data() {
        let parameters = socont_like();
        let table = parameters.model_parameters();
        let keys: Vec<_> = table
            .iter()
            .map(|p| format!("{}:{}", p.component, p.name))
            .collect();
        assert_eq!(
            keys,
            vec![
                "snowpack:degree_day_factor",
                "slow_reservoir:capacity",
                "surface_runoff:response_factor"
            ]
        );
        assert_eq!(table[1].value, Some(ParameterValue::Scalar(200.0)));
    }

    #[test]
    fn export_groups_by_component() {
        let mut parameters = socont_like();
        parameters
            .define(ParameterSpec::new("snowpack", "melting_temperature").alias("T_melt"))
            .unwrap();
        parameters.set_value("a_snow", 4.0).unwrap();

        let tree = parameters.export_by_component();
        let components: Vec<_> = tree.keys().cloned().collect();
        assert_eq!(
            components,
            vec!["snowpack", "slow_reservoir", "surface_runoff", "data"]
        );
        let snowpack: Vec<_> = tree["snowpack"].keys().cloned().collect();
        assert_eq!(snowpack, vec!["degree_day_factor", "melting_temperature"]);
        assert_eq!(
            tree["snowpack"]["degree_day_factor"],
            Some(ParameterValue::Scalar(4.0))
        );
        assert_eq!(tree["snowpack"]["melting_temperature"], None);
    }

    #[test]
    fn rebuild_from_exported_tree() {
        let mut parameters = socont_like();
        parameters
            .set_values([("a_snow", 4.0), ("k_quick", 0.2)])
            .unwrap();

        let rebuilt = ParameterSet::from_config(&parameters.export_by_component()).unwrap();
        assert_eq!(rebuilt.model_parameters(), parameters.model_parameters());
        assert!(rebuilt.is_for_forcing("precip_corr_factor").unwrap());
    }

    #[test]
    fn apply_exported_tree() {
        let mut source = socont_like();
        source.set_values([("a_snow", 4.0), ("k_quick", 0.2)]).unwrap();

        let mut target = socont_like();
        target.apply_config(&source.export_by_component()).unwrap();
        assert_eq!(target.model_parameters(), source.model_parameters());
    }

    #[test]
    fn allow_changing() {
        let mut parameters = socont_like();
        parameters.allow_changing(&["a_snow", "A"]).unwrap();
        assert_eq!(parameters.allowed_to_change(), &["a_snow", "A"]);

        let res = parameters.allow_changing(&["a_snow", "nope"]);
        assert!(matches!(res, Err(HBError::NotFound(_))));
        assert_eq!(parameters.allowed_to_change(), &["a_snow", "A"]);
    }

    #[test]
    fn constraints_on_registry() {
        let mut parameters = socont_like();
        parameters.define_constraint("a_snow", "<", "A").unwrap();
        parameters.set_values([("a_snow", 4.0), ("A", 300.0)]).unwrap();
        assert!(parameters.are_constraints_satisfied().unwrap());

        assert!(matches!(
            parameters.define_constraint("a_snow", "=>", "A"),
            Err(HBError::UnknownOperator(_))
        ));
        assert_eq!(parameters.constraints().len(), 1);
    }
}
