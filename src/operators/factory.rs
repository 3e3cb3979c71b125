//! Sources of node contents for operators that create or change nodes.

use crate::dag::NodeContent;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Supplies node contents to the variation operators.
pub trait NodeFactory: Send + Sync {
    /// Content for a new node. `is_primary` asks for a node without parents.
    fn get_node<R: Rng>(&self, is_primary: bool, rng: &mut R) -> Option<NodeContent>;

    /// A different content usable in place of `current`.
    fn exchange_node<R: Rng>(&self, current: &NodeContent, rng: &mut R) -> Option<NodeContent>;

    /// `current` with perturbed parameters; `None` if it has nothing to perturb.
    fn perturb_params<R: Rng>(&self, current: &NodeContent, rng: &mut R) -> Option<NodeContent>;
}

/// Draws operation names from two pools and jitters numeric parameters.
///
/// # Examples
///
/// ```
/// use u_graphevo::operators::{DefaultNodeFactory, NodeFactory};
/// use u_graphevo::random::create_rng;
///
/// let factory = DefaultNodeFactory::new(["x"], ["add", "mul"]);
/// let mut rng = create_rng(1);
/// assert_eq!(factory.get_node(true, &mut rng).unwrap().name, "x");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultNodeFactory {
    primary: Vec<String>,
    secondary: Vec<String>,
    defaults: BTreeMap<String, BTreeMap<String, f64>>,
    /// Relative perturbation amplitude.
    pub sigma: f64,
}

impl DefaultNodeFactory {
    pub fn new<P, S>(primary: P, secondary: S) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            primary: primary.into_iter().map(Into::into).collect(),
            secondary: secondary.into_iter().map(Into::into).collect(),
            defaults: BTreeMap::new(),
            sigma: 0.2,
        }
    }

    /// Default parameters attached to every new node named `name`.
    pub fn with_params(mut self, name: impl Into<String>, params: BTreeMap<String, f64>) -> Self {
        self.defaults.insert(name.into(), params);
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = sigma.max(0.0);
        self
    }

    fn content(&self, name: &str) -> NodeContent {
        NodeContent {
            name: name.to_string(),
            params: self.defaults.get(name).cloned().unwrap_or_default(),
        }
    }

    fn pool(&self, is_primary: bool) -> &[String] {
        let preferred = if is_primary { &self.primary } else { &self.secondary };
        if preferred.is_empty() {
            if is_primary {
                &self.secondary
            } else {
                &self.primary
            }
        } else {
            preferred
        }
    }
}

impl NodeFactory for DefaultNodeFactory {
    fn get_node<R: Rng>(&self, is_primary: bool, rng: &mut R) -> Option<NodeContent> {
        self.pool(is_primary).choose(rng).map(|name| self.content(name))
    }

    fn exchange_node<R: Rng>(&self, current: &NodeContent, rng: &mut R) -> Option<NodeContent> {
        let is_primary = self.primary.contains(&current.name);
        let candidates: Vec<&String> = self
            .pool(is_primary)
            .iter()
            .filter(|name| **name != current.name)
            .collect();
        candidates.choose(rng).map(|name| self.content(name))
    }

    fn perturb_params<R: Rng>(&self, current: &NodeContent, rng: &mut R) -> Option<NodeContent> {
        let keys: Vec<&String> = current.params.keys().collect();
        let key = (*keys.choose(rng)?).clone();
        let mut next = current.clone();
        if let Some(value) = next.params.get_mut(&key) {
            let jitter = self.sigma * rng.random_range(-1.0..=1.0);
            *value = if *value == 0.0 { jitter } else { *value * (1.0 + jitter) };
        }
        Some(next)
    }
}
