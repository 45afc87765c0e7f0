//! Domain and volume XML descriptors
//!
//! Generates minimal descriptors for defining domains and creating volumes,
//! and reads back the `<name>` a descriptor declares.

use color_eyre::{eyre::eyre, Result};

use crate::xml_utils::{self, XmlWriter};

/// An interface to attach to a virtual network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSpec {
    /// libvirt network name
    pub network: String,
    /// MAC address to assign
    pub mac: String,
}

/// A minimal domain descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDescriptor {
    /// Domain name
    pub name: String,
    /// Hypervisor type attribute (`kvm`, or `qemu` for emulation)
    pub domain_type: String,
    /// Memory in MiB
    pub memory_mib: u32,
    /// Number of virtual CPUs
    pub vcpus: u32,
    /// Interfaces, in device order
    pub interfaces: Vec<InterfaceSpec>,
}

impl DomainDescriptor {
    /// A 256 MiB, single-vCPU `kvm` domain with no devices
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain_type: "kvm".to_string(),
            memory_mib: 256,
            vcpus: 1,
            interfaces: Vec::new(),
        }
    }

    /// Use a different hypervisor type
    pub fn with_type(mut self, domain_type: impl Into<String>) -> Self {
        self.domain_type = domain_type.into();
        self
    }

    /// Attach an interface on `network` with `mac`
    pub fn with_interface(mut self, network: impl Into<String>, mac: impl Into<String>) -> Self {
        self.interfaces.push(InterfaceSpec {
            network: network.into(),
            mac: mac.into(),
        });
        self
    }

    /// Render the descriptor
    pub fn to_xml(&self) -> Result<String> {
        let memory = self.memory_mib.to_string();
        let vcpus = self.vcpus.to_string();

        let mut w = XmlWriter::new();
        w.start_element("domain", &[("type", self.domain_type.as_str())])?;
        w.write_text_element("name", &self.name, &[])?;
        w.write_text_element("memory", &memory, &[("unit", "MiB")])?;
        w.write_text_element("vcpu", &vcpus, &[])?;
        w.start_element("os", &[])?;
        w.write_text_element("type", "hvm", &[])?;
        w.end_element("os")?;
        w.start_element("devices", &[])?;
        for iface in &self.interfaces {
            w.start_element("interface", &[("type", "network")])?;
            w.write_empty_element("mac", &[("address", iface.mac.as_str())])?;
            w.write_empty_element("source", &[("network", iface.network.as_str())])?;
            w.end_element("interface")?;
        }
        w.end_element("devices")?;
        w.end_element("domain")?;
        w.into_string()
    }
}

/// A raw-format storage volume descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDescriptor {
    /// Volume name
    pub name: String,
    /// Capacity in bytes
    pub capacity: u64,
}

impl VolumeDescriptor {
    /// Render the descriptor
    pub fn to_xml(&self) -> Result<String> {
        let capacity = self.capacity.to_string();

        let mut w = XmlWriter::new();
        w.start_element("volume", &[])?;
        w.write_text_element("name", &self.name, &[])?;
        w.write_text_element("capacity", &capacity, &[("unit", "bytes")])?;
        w.start_element("target", &[])?;
        w.write_empty_element("format", &[("type", "raw")])?;
        w.end_element("target")?;
        w.end_element("volume")?;
        w.into_string()
    }
}

/// The `<name>` declared directly under a descriptor's root element
pub fn descriptor_name(xml: &str) -> Result<String> {
    let dom = xml_utils::parse_xml_dom(xml)?;
    dom.child("name")
        .map(|n| n.text_content().trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| eyre!("<{}> descriptor declares no name", dom.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::parse_interface_macs;
    use crate::matcher::MatchRecord;

    #[test]
    fn test_domain_descriptor_round_trips_through_parser() {
        let xml = DomainDescriptor::new("vm1")
            .with_type("qemu")
            .with_interface("br0_net", "52:54:00:aa:bb:cc")
            .with_interface("default", "52:54:00:00:00:01")
            .to_xml()
            .unwrap();

        assert!(xml.starts_with("<domain type=\"qemu\">"));
        assert_eq!(descriptor_name(&xml).unwrap(), "vm1");
        assert_eq!(
            parse_interface_macs("vm1", "br0_net", Some(&xml)).unwrap(),
            Some(MatchRecord::Entry {
                name: "vm1".into(),
                values: vec!["52:54:00:aa:bb:cc".into()],
            })
        );
    }

    #[test]
    fn test_volume_descriptor() {
        let xml = VolumeDescriptor {
            name: "v1".into(),
            capacity: 1 << 20,
        }
        .to_xml()
        .unwrap();
        assert!(xml.contains("<capacity unit=\"bytes\">1048576</capacity>"));
        assert!(xml.contains("<format type=\"raw\"/>"));
        assert_eq!(descriptor_name(&xml).unwrap(), "v1");
    }

    #[test]
    fn test_descriptor_without_name() {
        let err = descriptor_name("<volume><capacity>1</capacity></volume>").unwrap_err();
        assert_eq!(err.to_string(), "<volume> descriptor declares no name");
        assert!(descriptor_name("<domain><name> </name></domain>").is_err());
        // Nested names do not count
        assert!(descriptor_name("<domain><os><name>x</name></os></domain>").is_err());
    }
}
