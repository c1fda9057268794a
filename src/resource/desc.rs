use serde::{Deserialize, Serialize};

/// Resource dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Linear buffer; `width` is the size in bytes.
    Buffer,
    /// One-dimensional texture.
    Texture1D,
    /// Two-dimensional texture.
    Texture2D,
    /// Volume texture.
    Texture3D,
    /// Cube texture (a 2D texture array of six faces).
    TextureCube,
}

impl ResourceKind {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "buffer" | "structuredbuffer" | "rawbuffer" => Some(Self::Buffer),
            "texture1d" => Some(Self::Texture1D),
            "texture2d" => Some(Self::Texture2D),
            "texture3d" => Some(Self::Texture3D),
            "texturecube" => Some(Self::TextureCube),
            _ => None,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Buffer => 0,
            Self::Texture1D => 1,
            Self::Texture2D => 2,
            Self::Texture3D => 3,
            Self::TextureCube => 4,
        }
    }
}

/// Expected CPU/GPU access pattern of a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usage {
    /// GPU read/write.
    #[default]
    Default,
    /// GPU read only, initialized at creation.
    Immutable,
    /// GPU read, CPU write.
    Dynamic,
    /// CPU readable copy destination.
    Staging,
}

impl Usage {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "default" => Some(Self::Default),
            "immutable" => Some(Self::Immutable),
            "dynamic" => Some(Self::Dynamic),
            "staging" => Some(Self::Staging),
            _ => None,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Default => 0,
            Self::Immutable => 1,
            Self::Dynamic => 2,
            Self::Staging => 3,
        }
    }
}

macro_rules! flag_set {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $flag:ident = $bit:expr, $text:literal;)* }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl $name {
            $($(#[$fmeta])* pub const $flag: Self = Self($bit);)*

            /// Whether every bit in `other` is set.
            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            /// Union of both flag sets.
            pub fn with(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// `self` with every bit of `other` cleared.
            pub fn without(self, other: Self) -> Self {
                Self(self.0 & !other.0)
            }

            /// Parse a whitespace or `|` separated list of flag names, or a number.
            pub(crate) fn parse(s: &str) -> Option<Self> {
                if let Some(v) = crate::resource::desc::parse_uint(s) {
                    return Some(Self(v));
                }
                let mut out = Self(0);
                for word in s.split(|c: char| c.is_whitespace() || c == '|').filter(|w| !w.is_empty()) {
                    out = out.with(match word {
                        $($text => Self::$flag,)*
                        _ => return None,
                    });
                }
                Some(out)
            }
        }
    };
}

flag_set! {
    /// Pipeline stages a resource may be bound to.
    BindFlags {
        /// Vertex buffer input.
        VERTEX_BUFFER = 0x1, "vertex_buffer";
        /// Index buffer input.
        INDEX_BUFFER = 0x2, "index_buffer";
        /// Constant buffer.
        CONSTANT_BUFFER = 0x4, "constant_buffer";
        /// Shader resource view.
        SHADER_RESOURCE = 0x8, "shader_resource";
        /// Stream output target.
        STREAM_OUTPUT = 0x10, "stream_output";
        /// Render target view.
        RENDER_TARGET = 0x20, "render_target";
        /// Depth/stencil view.
        DEPTH_STENCIL = 0x40, "depth_stencil";
        /// Unordered access view.
        UNORDERED_ACCESS = 0x80, "unordered_access";
    }
}

flag_set! {
    /// CPU access requested for a resource.
    CpuAccess {
        /// CPU may write (dynamic resources).
        WRITE = 0x10000, "write";
        /// CPU may read (staging resources).
        READ = 0x20000, "read";
    }
}

flag_set! {
    /// Miscellaneous creation flags.
    MiscFlags {
        /// Texture is a cube map.
        TEXTURECUBE = 0x4, "texturecube";
        /// Buffer may be viewed as a raw byte address buffer.
        BUFFER_ALLOW_RAW_VIEWS = 0x20, "buffer_allow_raw_views";
        /// Buffer is a structured buffer with a fixed element stride.
        BUFFER_STRUCTURED = 0x40, "buffer_structured";
        /// Buffer holds indirect draw arguments.
        DRAWINDIRECT_ARGS = 0x10, "drawindirect_args";
    }
}

pub(crate) fn parse_uint(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x") {
        return u32::from_str_radix(hex, 16).ok();
    }
    s.parse().ok()
}

/// Texel/element format of a resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Format {
    #[default]
    Unknown,
    R32G32B32A32Typeless,
    R32G32B32A32Float,
    R32G32B32A32Uint,
    R16G16B16A16Typeless,
    R16G16B16A16Float,
    R10G10B10A2Unorm,
    R11G11B10Float,
    R8G8B8A8Typeless,
    R8G8B8A8Unorm,
    R8G8B8A8UnormSrgb,
    B8G8R8A8Typeless,
    B8G8R8A8Unorm,
    R32Typeless,
    R32Float,
    R32Uint,
    R24G8Typeless,
    R24UnormX8Typeless,
    R32G8X24Typeless,
    R32FloatX8X24Typeless,
    R16Typeless,
    R16Float,
    R16Unorm,
    R8Unorm,
    D32Float,
    D24UnormS8Uint,
    D32FloatS8X24Uint,
    D16Unorm,
}

impl Format {
    const NAMES: &'static [(Self, &'static str)] = &[
        (Self::Unknown, "unknown"),
        (Self::R32G32B32A32Typeless, "r32g32b32a32_typeless"),
        (Self::R32G32B32A32Float, "r32g32b32a32_float"),
        (Self::R32G32B32A32Uint, "r32g32b32a32_uint"),
        (Self::R16G16B16A16Typeless, "r16g16b16a16_typeless"),
        (Self::R16G16B16A16Float, "r16g16b16a16_float"),
        (Self::R10G10B10A2Unorm, "r10g10b10a2_unorm"),
        (Self::R11G11B10Float, "r11g11b10_float"),
        (Self::R8G8B8A8Typeless, "r8g8b8a8_typeless"),
        (Self::R8G8B8A8Unorm, "r8g8b8a8_unorm"),
        (Self::R8G8B8A8UnormSrgb, "r8g8b8a8_unorm_srgb"),
        (Self::B8G8R8A8Typeless, "b8g8r8a8_typeless"),
        (Self::B8G8R8A8Unorm, "b8g8r8a8_unorm"),
        (Self::R32Typeless, "r32_typeless"),
        (Self::R32Float, "r32_float"),
        (Self::R32Uint, "r32_uint"),
        (Self::R24G8Typeless, "r24g8_typeless"),
        (Self::R24UnormX8Typeless, "r24_unorm_x8_typeless"),
        (Self::R32G8X24Typeless, "r32g8x24_typeless"),
        (Self::R32FloatX8X24Typeless, "r32_float_x8x24_typeless"),
        (Self::R16Typeless, "r16_typeless"),
        (Self::R16Float, "r16_float"),
        (Self::R16Unorm, "r16_unorm"),
        (Self::R8Unorm, "r8_unorm"),
        (Self::D32Float, "d32_float"),
        (Self::D24UnormS8Uint, "d24_unorm_s8_uint"),
        (Self::D32FloatS8X24Uint, "d32_float_s8x24_uint"),
        (Self::D16Unorm, "d16_unorm"),
    ];

    /// Parse a format name, with or without the `dxgi_format_` prefix.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix("dxgi_format_").unwrap_or(s);
        Self::NAMES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(f, _)| *f)
    }

    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(f, _)| *f == self)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }

    pub(crate) fn bytes_per_texel(self) -> u32 {
        match self {
            Self::Unknown => 1,
            Self::R32G32B32A32Typeless | Self::R32G32B32A32Float | Self::R32G32B32A32Uint => 16,
            Self::R16G16B16A16Typeless
            | Self::R16G16B16A16Float
            | Self::R32G8X24Typeless
            | Self::R32FloatX8X24Typeless
            | Self::D32FloatS8X24Uint => 8,
            Self::R16Typeless | Self::R16Float | Self::R16Unorm | Self::D16Unorm => 2,
            Self::R8Unorm => 1,
            _ => 4,
        }
    }

    /// Whether this is a depth/stencil format.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Self::D32Float | Self::D24UnormS8Uint | Self::D32FloatS8X24Uint | Self::D16Unorm
        )
    }

    /// Typeless equivalent, so one resource can back both depth and shader resource views.
    pub fn typeless(self) -> Self {
        match self {
            Self::D32Float | Self::R32Float | Self::R32Uint => Self::R32Typeless,
            Self::D24UnormS8Uint | Self::R24UnormX8Typeless => Self::R24G8Typeless,
            Self::D32FloatS8X24Uint | Self::R32FloatX8X24Typeless => Self::R32G8X24Typeless,
            Self::D16Unorm | Self::R16Float | Self::R16Unorm => Self::R16Typeless,
            Self::R8G8B8A8Unorm | Self::R8G8B8A8UnormSrgb => Self::R8G8B8A8Typeless,
            Self::B8G8R8A8Unorm => Self::B8G8R8A8Typeless,
            Self::R16G16B16A16Float => Self::R16G16B16A16Typeless,
            Self::R32G32B32A32Float | Self::R32G32B32A32Uint => Self::R32G32B32A32Typeless,
            other => other,
        }
    }

    /// Format usable for a shader resource view of a (possibly typeless) depth resource.
    pub(crate) fn shader_readable(self) -> Self {
        match self {
            Self::D32Float | Self::R32Typeless => Self::R32Float,
            Self::D24UnormS8Uint | Self::R24G8Typeless => Self::R24UnormX8Typeless,
            Self::D32FloatS8X24Uint | Self::R32G8X24Typeless => Self::R32FloatX8X24Typeless,
            Self::D16Unorm | Self::R16Typeless => Self::R16Unorm,
            other => other,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        Self::NAMES.iter().position(|(f, _)| *f == self).unwrap_or(0) as u8
    }
}

/// Creation description of a GPU resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDesc {
    /// Dimensionality.
    pub kind: ResourceKind,
    /// Width in texels, or size in bytes for buffers.
    pub width: u32,
    /// Height in texels (1 for buffers and 1D textures).
    pub height: u32,
    /// Depth in texels for volume textures, 1 otherwise.
    pub depth: u32,
    /// Array slices (6 per cube).
    pub array_size: u32,
    /// Mip levels.
    pub mips: u32,
    /// Texel format; `Unknown` for untyped buffers.
    pub format: Format,
    /// MSAA sample count.
    pub samples: u32,
    /// Access pattern.
    pub usage: Usage,
    /// Allowed bind points.
    pub bind: BindFlags,
    /// CPU access.
    pub cpu_access: CpuAccess,
    /// Miscellaneous flags.
    pub misc: MiscFlags,
    /// Element stride for structured buffers and vertex data, 0 otherwise.
    pub stride: u32,
}

impl ResourceDesc {
    /// Plain byte buffer description.
    pub fn buffer(byte_width: u32, bind: BindFlags) -> Self {
        Self {
            kind: ResourceKind::Buffer,
            width: byte_width,
            height: 1,
            depth: 1,
            array_size: 1,
            mips: 1,
            format: Format::Unknown,
            samples: 1,
            usage: Usage::Default,
            bind,
            cpu_access: CpuAccess::default(),
            misc: MiscFlags::default(),
            stride: 0,
        }
    }

    /// Single-sample 2D texture description.
    pub fn texture2d(width: u32, height: u32, format: Format, bind: BindFlags) -> Self {
        Self {
            kind: ResourceKind::Texture2D,
            width,
            height,
            depth: 1,
            array_size: 1,
            mips: 1,
            format,
            samples: 1,
            usage: Usage::Default,
            bind,
            cpu_access: CpuAccess::default(),
            misc: MiscFlags::default(),
            stride: 0,
        }
    }

    /// Approximate size of the top mip across all slices, in bytes.
    pub fn byte_size(&self) -> u64 {
        match self.kind {
            ResourceKind::Buffer => u64::from(self.width),
            _ => {
                u64::from(self.width)
                    * u64::from(self.height.max(1))
                    * u64::from(self.depth.max(1))
                    * u64::from(self.array_size.max(1))
                    * u64::from(self.format.bytes_per_texel())
            }
        }
    }

    /// Structured buffers have a non-zero stride and the structured misc flag.
    pub fn is_structured(&self) -> bool {
        self.kind == ResourceKind::Buffer
            && self.stride > 0
            && self.misc.contains(MiscFlags::BUFFER_STRUCTURED)
    }
}

impl std::fmt::Display for ResourceDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} {}x{}x{} array={} mips={} format={} samples={} usage={:?} bind=0x{:x} cpu=0x{:x} misc=0x{:x} stride={}",
            self.kind,
            self.width,
            self.height,
            self.depth,
            self.array_size,
            self.mips,
            self.format.name(),
            self.samples,
            self.usage,
            self.bind.0,
            self.cpu_access.0,
            self.misc.0,
            self.stride
        )
    }
}
