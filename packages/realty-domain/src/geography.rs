use std::collections::{HashMap, HashSet};

use crate::requirements::District;

/// Case-insensitive view over the configured adjacency and parent-city tables.
#[derive(Clone, Debug, Default)]
pub struct GeographyIndex {
	adjacency: HashMap<String, Vec<String>>,
	parent_city: HashMap<String, String>,
	places: HashSet<String>,
}
impl GeographyIndex {
	pub fn new(cfg: &realty_config::Geography) -> Self {
		let mut places = HashSet::new();
		let adjacency = cfg
			.adjacency
			.iter()
			.map(|(district, neighbours)| {
				places.insert(district.to_lowercase());
				places.extend(neighbours.iter().map(|neighbour| neighbour.to_lowercase()));

				(district.to_lowercase(), neighbours.clone())
			})
			.collect();
		let parent_city = cfg
			.parent_city
			.iter()
			.map(|(district, city)| {
				places.insert(district.to_lowercase());
				places.insert(city.to_lowercase());

				(district.to_lowercase(), city.clone())
			})
			.collect();

		places.extend(cfg.known_places.iter().map(|place| place.to_lowercase()));

		Self { adjacency, parent_city, places }
	}

	/// Nearest neighbours of the requested district(s), excluding the requested ones.
	pub fn neighbours(&self, district: &District) -> Vec<String> {
		let requested = district.names();
		let mut out: Vec<String> = Vec::new();

		for name in requested {
			let Some(neighbours) = self.adjacency.get(&name.to_lowercase()) else {
				continue;
			};

			for neighbour in neighbours {
				let already = out.iter().any(|seen| seen.eq_ignore_ascii_case(neighbour))
					|| requested.iter().any(|name| name.eq_ignore_ascii_case(neighbour));

				if !already {
					out.push(neighbour.clone());
				}
			}
		}

		out
	}

	/// The city containing the district(s); `None` when unknown or when a multi-district
	/// requirement spans several cities.
	pub fn parent_city(&self, district: &District) -> Option<String> {
		match district {
			District::Single(name) => self.parent_city.get(&name.to_lowercase()).cloned(),
			District::Multiple(names) => {
				let mut cities =
					names.iter().map(|name| self.parent_city.get(&name.to_lowercase()));
				let first = cities.next().flatten()?;
				let shared =
					cities.all(|city| city.is_some_and(|city| city.eq_ignore_ascii_case(first)));

				shared.then(|| first.clone())
			},
		}
	}

	pub fn is_known_place(&self, token: &str) -> bool {
		self.places.contains(&token.to_lowercase())
	}

	/// Known place names, each lowercased. Multi-word names are included as-is.
	pub fn places(&self) -> impl Iterator<Item = &str> {
		self.places.iter().map(String::as_str)
	}
}
