use std::{collections::BTreeMap, fs::File, io::Read, str::FromStr};

use anyhow::{anyhow, bail, ensure, Context, Result};
use regex::Regex;
use strum::EnumString;
use tracing::debug;

pub use matrix::Matrix;

mod matrix;

pub type CityId = usize;

/// Every route starts and ends here.
pub const DEPOT: CityId = 1;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_from(&self, other: &Point) -> f64 {
        ((other.y - self.y).powi(2) + (other.x - self.x).powi(2)).sqrt()
    }
}

/// A CVRP instance: one vehicle capacity, and a coordinate and demand per city.
#[derive(Debug, Clone)]
pub struct Problem {
    pub name: String,
    pub comment: String,
    dimension: Option<usize>,
    pub capacity: usize,
    /// Known optimal cost, only used when reporting.
    pub optimal: Option<f64>,
    pub coordinates: BTreeMap<CityId, Point>,
    pub demands: BTreeMap<CityId, usize>,
}

pub type NomResult<I, O> = nom::IResult<I, O, nom::error::VerboseError<I>>;

/// Instance file content before any semantic checks.
#[derive(Debug)]
struct RawInstance<'a> {
    headers: Vec<(&'a str, &'a str)>,
    coordinates: Vec<(CityId, Point)>,
    demands: Vec<(CityId, usize)>,
    depots: Option<Vec<i64>>,
}

impl Problem {
    pub fn new(
        capacity: usize,
        coordinates: BTreeMap<CityId, Point>,
        demands: BTreeMap<CityId, usize>,
    ) -> Self {
        Self {
            name: String::new(),
            comment: String::new(),
            dimension: None,
            capacity,
            optimal: None,
            coordinates,
            demands,
        }
    }

    /// Numbers cities `1..` in the order given, the first one being the depot.
    #[cfg(test)]
    pub(crate) fn from_cities(capacity: usize, cities: &[((f64, f64), usize)]) -> Self {
        let coordinates = cities
            .iter()
            .enumerate()
            .map(|(i, &((x, y), _))| (i + 1, Point::new(x, y)))
            .collect();
        let demands = cities
            .iter()
            .enumerate()
            .map(|(i, &(_, d))| (i + 1, d))
            .collect();
        Self::new(capacity, coordinates, demands)
    }

    pub fn num_cities(&self) -> usize {
        self.coordinates.len()
    }

    fn parse(i: &str) -> NomResult<&str, RawInstance<'_>> {
        // Local use statement so as not to clutter top of file, we need many
        use nom::{
            branch::alt,
            bytes::complete::{tag, take_while1},
            character::complete::{
                char, digit1, line_ending, multispace0, not_line_ending, space0, space1,
            },
            combinator::{eof, map, map_res, opt, recognize},
            multi::many0,
            number::complete::double,
            sequence::{pair, preceded, separated_pair, terminated, tuple},
        };

        /******************************/
        /*        Helper parsers      */
        /******************************/

        // Consumes trailing spaces, then a line ending or the end of input
        fn eol(i: &str) -> NomResult<&str, &str> {
            preceded(space0, alt((line_ending, eof)))(i)
        }

        // "<KEY> : <anything up to the end of line>"
        fn header(i: &str) -> NomResult<&str, (&str, &str)> {
            terminated(
                separated_pair(
                    preceded(
                        space0,
                        take_while1(|c: char| c.is_ascii_uppercase() || c == '_'),
                    ),
                    tuple((space0, char(':'), space0)),
                    not_line_ending,
                ),
                eol,
            )(i)
        }

        fn city_id(i: &str) -> NomResult<&str, CityId> {
            preceded(space0, map_res(digit1, CityId::from_str))(i)
        }

        // "<id> <x> <y>"
        fn coordinate(i: &str) -> NomResult<&str, (CityId, Point)> {
            map(
                terminated(
                    tuple((city_id, preceded(space1, double), preceded(space1, double))),
                    eol,
                ),
                |(id, x, y)| (id, Point::new(x, y)),
            )(i)
        }

        // "<id> <demand>"
        fn demand(i: &str) -> NomResult<&str, (CityId, usize)> {
            terminated(
                separated_pair(city_id, space1, map_res(digit1, usize::from_str)),
                eol,
            )(i)
        }

        // A depot id, or the "-1" terminator
        fn depot(i: &str) -> NomResult<&str, i64> {
            terminated(
                preceded(
                    space0,
                    map_res(recognize(pair(opt(char('-')), digit1)), i64::from_str),
                ),
                eol,
            )(i)
        }

        // A section title line followed by any number of entries, blank lines allowed
        fn section<'a, O, F>(
            name: &'static str,
            entry: F,
        ) -> impl FnMut(&'a str) -> NomResult<&'a str, Vec<O>>
        where
            F: FnMut(&'a str) -> NomResult<&'a str, O>,
        {
            preceded(
                tuple((multispace0, tag(name), eol)),
                many0(preceded(multispace0, entry)),
            )
        }

        // Optional "EOF" marker, then nothing but whitespace
        fn trailer(i: &str) -> NomResult<&str, ()> {
            map(
                tuple((opt(preceded(multispace0, tag("EOF"))), multispace0, eof)),
                |_| (),
            )(i)
        }

        /******************************/
        /*       Actual Parsing       */
        /******************************/

        let (i, headers) = many0(preceded(multispace0, header))(i)?;
        let (i, coordinates) = section("NODE_COORD_SECTION", coordinate)(i)?;
        let (i, demands) = section("DEMAND_SECTION", demand)(i)?;
        let (i, depots) = opt(section("DEPOT_SECTION", depot))(i)?;
        let (i, _) = trailer(i)?;

        Ok((
            i,
            RawInstance {
                headers,
                coordinates,
                demands,
                depots,
            },
        ))
    }

    pub fn try_from_vrp(mut vrp: File) -> Result<Self> {
        let mut contents = String::new();
        vrp.read_to_string(&mut contents)?;
        Self::parse_str(&contents)
    }

    pub fn parse_str(contents: &str) -> Result<Self> {
        use nom::{
            Err::{Error, Failure, Incomplete},
            Offset,
        };

        let raw = match Problem::parse(contents) {
            Ok((_, raw)) => raw,

            // The error holds slices into contents, so it is rendered to an owned message here
            Err(Failure(err) | Error(err)) => {
                let mut message = String::from("Parsing failed:");
                for (error_slice, err) in err.errors {
                    let offset = contents.offset(error_slice);
                    let excerpt: String = error_slice.chars().take(30).collect();
                    message += &format!(" {:?} at position {}: '{}'", err, offset, excerpt);
                }
                bail!(message)
            }

            Err(Incomplete(_)) => bail!("Parsing failed: unexpected end of input"),
        };

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawInstance<'_>) -> Result<Self> {
        let mut name = String::new();
        let mut comment = String::new();
        let mut dimension = None;
        let mut capacity = None;

        for (key, value) in raw.headers {
            let value = value.trim();
            match key {
                "NAME" => name = value.to_string(),
                "COMMENT" => {
                    comment = value
                        .trim_start_matches('(')
                        .trim_end_matches(')')
                        .to_string()
                }
                "TYPE" => {
                    ProblemType::from_str(value)
                        .map_err(|_| anyhow!("unsupported problem TYPE '{}'", value))?;
                }
                "EDGE_WEIGHT_TYPE" => {
                    EdgeWeightType::from_str(value)
                        .map_err(|_| anyhow!("unsupported EDGE_WEIGHT_TYPE '{}'", value))?;
                }
                "DIMENSION" => {
                    dimension = Some(
                        value
                            .parse::<usize>()
                            .with_context(|| format!("invalid DIMENSION '{}'", value))?,
                    )
                }
                "CAPACITY" => {
                    capacity = Some(
                        value
                            .parse::<usize>()
                            .with_context(|| format!("invalid CAPACITY '{}'", value))?,
                    )
                }
                _ => debug!(key, "ignoring unknown header"),
            }
        }

        if let Some(depots) = raw.depots {
            let depots: Vec<i64> = depots.into_iter().take_while(|&d| d != -1).collect();
            ensure!(
                depots == [DEPOT as i64],
                "only a single depot with id {} is supported, found {:?}",
                DEPOT,
                depots
            );
        }

        let mut problem = Self::new(
            capacity.ok_or_else(|| anyhow!("missing CAPACITY header"))?,
            collect_unique("NODE_COORD_SECTION", raw.coordinates)?,
            collect_unique("DEMAND_SECTION", raw.demands)?,
        );
        problem.optimal = optimal_from_comment(&comment);
        problem.name = name;
        problem.comment = comment;
        problem.dimension = dimension;

        Ok(problem)
    }

    /// Rejects instances the solver cannot run on, most importantly a city
    /// that no vehicle could ever serve.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.capacity > 0, "vehicle capacity must be positive");

        if let Some(dimension) = self.dimension {
            ensure!(
                self.coordinates.len() == dimension,
                "DIMENSION is {} but {} coordinates were given",
                dimension,
                self.coordinates.len()
            );
            ensure!(
                self.demands.len() == dimension,
                "DIMENSION is {} but {} demands were given",
                dimension,
                self.demands.len()
            );
        }

        check_city_ids(&self.coordinates, &self.demands)?;

        ensure!(
            self.demands.get(&DEPOT) == Some(&0),
            "depot demand must be 0"
        );

        if let Some((&city, &demand)) = self.demands.iter().max_by_key(|&(_, &d)| d) {
            ensure!(
                demand <= self.capacity,
                "city {} demands {} but vehicle capacity is only {}",
                city,
                demand,
                self.capacity
            );
        }

        Ok(())
    }
}

/// Checks that coordinates and demands describe the same cities, numbered
/// `1..=n` with the depot and at least one customer. Returns `n`.
pub(crate) fn check_city_ids(
    coordinates: &BTreeMap<CityId, Point>,
    demands: &BTreeMap<CityId, usize>,
) -> Result<usize> {
    ensure!(
        coordinates.keys().eq(demands.keys()),
        "coordinate and demand sections list different cities"
    );

    let n = coordinates.len();
    ensure!(
        coordinates.keys().copied().eq(1..=n),
        "city ids must be numbered 1..={} without gaps",
        n
    );
    ensure!(n >= 2, "instance needs the depot and at least one customer");

    Ok(n)
}

fn collect_unique<V>(section: &str, entries: Vec<(CityId, V)>) -> Result<BTreeMap<CityId, V>> {
    let mut map = BTreeMap::new();
    for (id, value) in entries {
        if map.insert(id, value).is_some() {
            bail!("city {} is listed twice in {}", id, section);
        }
    }
    Ok(map)
}

// Either "... Optimal value: 784 ..." or a comment that is just the number
fn optimal_from_comment(comment: &str) -> Option<f64> {
    let regex = Regex::new(r"(?i)optimal value\s*:\s*(?P<value>[0-9]+(?:\.[0-9]+)?)").ok()?;

    match regex.captures(comment) {
        Some(captures) => captures.name("value")?.as_str().parse().ok(),
        None => comment.trim().parse().ok(),
    }
}

#[non_exhaustive]
#[derive(Debug, PartialEq, EnumString)]
enum ProblemType {
    #[strum(ascii_case_insensitive)]
    Cvrp,
}

#[non_exhaustive]
#[derive(Debug, PartialEq, EnumString)]
enum EdgeWeightType {
    #[strum(serialize = "EUC_2D")]
    Euc2d,
}
