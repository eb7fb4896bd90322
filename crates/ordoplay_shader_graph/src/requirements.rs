// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capability requirements.
//!
//! Nodes may need interpolated geometry (normals, positions, ...) or global
//! inputs (time, screen position) that the surrounding pipeline has to
//! provide. Each capability is queried through one dispatch point,
//! [`MayRequire::requirement_within`], keyed by a [`Capability`] tag.
//! Answers from several nodes are folded with [`Requirement::combine`].

use crate::asset::{AssetHandle, AssetResolver};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of coordinate spaces a geometric quantity is needed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NeededCoordinateSpace(u8);

impl NeededCoordinateSpace {
    /// Not needed
    pub const NONE: Self = Self(0);
    /// Object space
    pub const OBJECT: Self = Self(1 << 0);
    /// View space
    pub const VIEW: Self = Self(1 << 1);
    /// World space
    pub const WORLD: Self = Self(1 << 2);
    /// Tangent space
    pub const TANGENT: Self = Self(1 << 3);

    const NAMES: [(Self, &'static str); 4] = [
        (Self::OBJECT, "Object"),
        (Self::VIEW, "View"),
        (Self::WORLD, "World"),
        (Self::TANGENT, "Tangent"),
    ];

    /// Raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Whether no space is needed
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether every space in `other` is also in `self`
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for NeededCoordinateSpace {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for NeededCoordinateSpace {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for NeededCoordinateSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(space, _)| self.contains(*space))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join("|"))
    }
}

/// Mesh UV channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UvChannel {
    /// First UV set
    Uv0,
    /// Second UV set
    Uv1,
    /// Third UV set
    Uv2,
    /// Fourth UV set
    Uv3,
}

impl UvChannel {
    /// Every channel
    pub const ALL: [UvChannel; 4] = [Self::Uv0, Self::Uv1, Self::Uv2, Self::Uv3];

    /// Channel index
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A capability a node may require from the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Surface normal
    Normal,
    /// Surface tangent
    Tangent,
    /// Surface bitangent
    Bitangent,
    /// Vertex / fragment position
    Position,
    /// Direction towards the viewer
    ViewDirection,
    /// Mesh UV set
    MeshUv(UvChannel),
    /// Screen-space position
    ScreenPosition,
    /// Global time
    Time,
    /// Vertex color
    VertexColor,
}

impl Capability {
    /// Every capability, with one entry per UV channel
    pub fn all() -> impl Iterator<Item = Capability> {
        [
            Self::Normal,
            Self::Tangent,
            Self::Bitangent,
            Self::Position,
            Self::ViewDirection,
            Self::ScreenPosition,
            Self::Time,
            Self::VertexColor,
        ]
        .into_iter()
        .chain(UvChannel::ALL.into_iter().map(Self::MeshUv))
    }

    /// Whether the answer for this capability is a coordinate-space mask
    pub fn is_mask(&self) -> bool {
        matches!(
            self,
            Self::Normal | Self::Tangent | Self::Bitangent | Self::Position | Self::ViewDirection
        )
    }

    /// Answer meaning "not required"
    pub fn neutral(&self) -> Requirement {
        if self.is_mask() {
            Requirement::Space(NeededCoordinateSpace::NONE)
        } else {
            Requirement::Flag(false)
        }
    }
}

/// Answer to a capability query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    /// Coordinate spaces needed
    Space(NeededCoordinateSpace),
    /// Whether the capability is needed
    Flag(bool),
}

impl Requirement {
    /// Fold two answers for the same capability
    pub fn combine(self, other: Requirement) -> Requirement {
        match (self, other) {
            (Self::Space(a), Self::Space(b)) => Self::Space(a | b),
            (Self::Flag(a), Self::Flag(b)) => Self::Flag(a || b),
            (mismatched, _) => mismatched,
        }
    }

    /// Mask value, empty for flags
    pub fn as_space(&self) -> NeededCoordinateSpace {
        match self {
            Self::Space(space) => *space,
            Self::Flag(_) => NeededCoordinateSpace::NONE,
        }
    }

    /// Flag value, `true` for a non-empty mask
    pub fn as_flag(&self) -> bool {
        match self {
            Self::Space(space) => !space.is_empty(),
            Self::Flag(flag) => *flag,
        }
    }

    /// Whether this answer means "not required"
    pub fn is_neutral(&self) -> bool {
        !self.as_flag()
    }
}

/// Full set of requirements, for one node or an aggregate of nodes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderGraphRequirements {
    /// Normal spaces
    pub normal: NeededCoordinateSpace,
    /// Tangent spaces
    pub tangent: NeededCoordinateSpace,
    /// Bitangent spaces
    pub bitangent: NeededCoordinateSpace,
    /// Position spaces
    pub position: NeededCoordinateSpace,
    /// View direction spaces
    pub view_direction: NeededCoordinateSpace,
    /// Mesh UV channels, ascending
    pub mesh_uv: Vec<UvChannel>,
    /// Screen position
    pub screen_position: bool,
    /// Time
    pub time: bool,
    /// Vertex color
    pub vertex_color: bool,
}

impl ShaderGraphRequirements {
    /// Empty requirement set
    pub fn none() -> Self {
        Self::default()
    }

    /// Require the normal in `space`
    pub fn with_normal(mut self, space: NeededCoordinateSpace) -> Self {
        self.normal |= space;
        self
    }

    /// Require the tangent in `space`
    pub fn with_tangent(mut self, space: NeededCoordinateSpace) -> Self {
        self.tangent |= space;
        self
    }

    /// Require the bitangent in `space`
    pub fn with_bitangent(mut self, space: NeededCoordinateSpace) -> Self {
        self.bitangent |= space;
        self
    }

    /// Require the position in `space`
    pub fn with_position(mut self, space: NeededCoordinateSpace) -> Self {
        self.position |= space;
        self
    }

    /// Require the view direction in `space`
    pub fn with_view_direction(mut self, space: NeededCoordinateSpace) -> Self {
        self.view_direction |= space;
        self
    }

    /// Require a mesh UV channel
    pub fn with_uv(mut self, channel: UvChannel) -> Self {
        self.record(Capability::MeshUv(channel), Requirement::Flag(true));
        self
    }

    /// Require the screen position
    pub fn with_screen_position(mut self) -> Self {
        self.screen_position = true;
        self
    }

    /// Require time
    pub fn with_time(mut self) -> Self {
        self.time = true;
        self
    }

    /// Require vertex color
    pub fn with_vertex_color(mut self) -> Self {
        self.vertex_color = true;
        self
    }

    /// Answer a single capability query
    pub fn query(&self, capability: Capability) -> Requirement {
        match capability {
            Capability::Normal => Requirement::Space(self.normal),
            Capability::Tangent => Requirement::Space(self.tangent),
            Capability::Bitangent => Requirement::Space(self.bitangent),
            Capability::Position => Requirement::Space(self.position),
            Capability::ViewDirection => Requirement::Space(self.view_direction),
            Capability::MeshUv(channel) => Requirement::Flag(self.mesh_uv.contains(&channel)),
            Capability::ScreenPosition => Requirement::Flag(self.screen_position),
            Capability::Time => Requirement::Flag(self.time),
            Capability::VertexColor => Requirement::Flag(self.vertex_color),
        }
    }

    /// Fold `requirement` into the answer recorded for `capability`
    pub fn record(&mut self, capability: Capability, requirement: Requirement) {
        let space = requirement.as_space();
        let flag = requirement.as_flag();
        match capability {
            Capability::Normal => self.normal |= space,
            Capability::Tangent => self.tangent |= space,
            Capability::Bitangent => self.bitangent |= space,
            Capability::Position => self.position |= space,
            Capability::ViewDirection => self.view_direction |= space,
            Capability::MeshUv(channel) => {
                if flag && !self.mesh_uv.contains(&channel) {
                    self.mesh_uv.push(channel);
                    self.mesh_uv.sort();
                }
            }
            Capability::ScreenPosition => self.screen_position |= flag,
            Capability::Time => self.time |= flag,
            Capability::VertexColor => self.vertex_color |= flag,
        }
    }

    /// Union of two requirement sets
    pub fn union(mut self, other: &ShaderGraphRequirements) -> Self {
        for capability in Capability::all() {
            self.record(capability, other.query(capability));
        }
        self
    }

    /// Whether nothing is required
    pub fn is_empty(&self) -> bool {
        Capability::all().all(|capability| self.query(capability).is_neutral())
    }

    /// Aggregate the requirements of a set of nodes
    pub fn from_nodes<'a, N>(nodes: impl IntoIterator<Item = &'a N>, assets: &dyn AssetResolver) -> Self
    where
        N: MayRequire + 'a,
    {
        let nodes: Vec<&N> = nodes.into_iter().collect();
        let mut requirements = Self::default();
        for capability in Capability::all() {
            requirements.record(capability, aggregate(nodes.iter().copied(), capability, assets));
        }
        requirements
    }
}

/// Fold one capability over a set of nodes
pub fn aggregate<'a, N>(
    nodes: impl IntoIterator<Item = &'a N>,
    capability: Capability,
    assets: &dyn AssetResolver,
) -> Requirement
where
    N: MayRequire + 'a,
{
    let mut expanding = Vec::new();
    aggregate_within(nodes, capability, assets, &mut expanding)
}

pub(crate) fn aggregate_within<'a, N>(
    nodes: impl IntoIterator<Item = &'a N>,
    capability: Capability,
    assets: &dyn AssetResolver,
    expanding: &mut Vec<AssetHandle>,
) -> Requirement
where
    N: MayRequire + 'a,
{
    nodes.into_iter().fold(capability.neutral(), |acc, node| {
        acc.combine(node.requirement_within(capability, assets, expanding))
    })
}

/// Something that may require pipeline capabilities
pub trait MayRequire {
    /// Answer `capability` while the sub-graphs in `expanding` are being walked
    fn requirement_within(
        &self,
        capability: Capability,
        assets: &dyn AssetResolver,
        expanding: &mut Vec<AssetHandle>,
    ) -> Requirement;

    /// Answer `capability`
    fn requirement(&self, capability: Capability, assets: &dyn AssetResolver) -> Requirement {
        self.requirement_within(capability, assets, &mut Vec::new())
    }

    /// Spaces the normal is needed in
    fn requires_normal(&self, assets: &dyn AssetResolver) -> NeededCoordinateSpace {
        self.requirement(Capability::Normal, assets).as_space()
    }

    /// Spaces the tangent is needed in
    fn requires_tangent(&self, assets: &dyn AssetResolver) -> NeededCoordinateSpace {
        self.requirement(Capability::Tangent, assets).as_space()
    }

    /// Spaces the bitangent is needed in
    fn requires_bitangent(&self, assets: &dyn AssetResolver) -> NeededCoordinateSpace {
        self.requirement(Capability::Bitangent, assets).as_space()
    }

    /// Spaces the position is needed in
    fn requires_position(&self, assets: &dyn AssetResolver) -> NeededCoordinateSpace {
        self.requirement(Capability::Position, assets).as_space()
    }

    /// Spaces the view direction is needed in
    fn requires_view_direction(&self, assets: &dyn AssetResolver) -> NeededCoordinateSpace {
        self.requirement(Capability::ViewDirection, assets).as_space()
    }

    /// Whether a mesh UV channel is needed
    fn requires_mesh_uv(&self, channel: UvChannel, assets: &dyn AssetResolver) -> bool {
        self.requirement(Capability::MeshUv(channel), assets).as_flag()
    }

    /// Whether the screen position is needed
    fn requires_screen_position(&self, assets: &dyn AssetResolver) -> bool {
        self.requirement(Capability::ScreenPosition, assets).as_flag()
    }

    /// Whether time is needed
    fn requires_time(&self, assets: &dyn AssetResolver) -> bool {
        self.requirement(Capability::Time, assets).as_flag()
    }

    /// Whether vertex color is needed
    fn requires_vertex_color(&self, assets: &dyn AssetResolver) -> bool {
        self.requirement(Capability::VertexColor, assets).as_flag()
    }
}

impl MayRequire for ShaderGraphRequirements {
    fn requirement_within(
        &self,
        capability: Capability,
        _assets: &dyn AssetResolver,
        _expanding: &mut Vec<AssetHandle>,
    ) -> Requirement {
        self.query(capability)
    }
}
