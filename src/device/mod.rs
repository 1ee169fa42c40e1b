//! Devices: regions, contacts, interfaces and the equations on them.
//!
//! Unknowns are numbered region by region in insertion order. Within a
//! region numbering is variable-major: `base + var * node_count + node`.

mod contact;
mod model;
mod region;

use std::ops::Range;

pub use contact::{Contact, Interface, InterfaceContext, InterfaceModelFn, Side};
pub use model::{EntityKind, ModelCache, ModelContext, ModelFn, NamedModel};
pub use region::{
    ElementEdge, NodeSolution, Region, Variable, EDGE_COUPLE, ELEMENT_EDGE_COUPLE, NODE_VOLUME,
};

use crate::dsl::CommandRecord;
use crate::equation::{BulkEquation, ContactEquation, EquationAssembler, InterfaceEquation};
use crate::error::{Result, TcadError};

/// Rows of one equation variable, used for per-equation error reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquationBlock {
    pub name: String,
    pub rows: Range<usize>,
}

/// A simulated device.
#[derive(Debug)]
pub struct Device {
    name: String,
    regions: Vec<Region>,
    contacts: Vec<Contact>,
    interfaces: Vec<Interface>,
    bulk_equations: Vec<BulkEquation>,
    contact_equations: Vec<ContactEquation>,
    interface_equations: Vec<InterfaceEquation>,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            regions: Vec::new(),
            contacts: Vec::new(),
            interfaces: Vec::new(),
            bulk_equations: Vec::new(),
            contact_equations: Vec::new(),
            interface_equations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ============ Regions ============

    /// Add a region, returning its index.
    pub fn add_region(&mut self, region: Region) -> Result<usize> {
        if self.region_index(region.name()).is_some() {
            return Err(TcadError::InvalidTopology {
                region: region.name().to_string(),
                message: format!("region already exists on device {}", self.name),
            });
        }
        self.regions.push(region);
        Ok(self.regions.len() - 1)
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region_index(&self, name: &str) -> Option<usize> {
        self.regions.iter().position(|r| r.name() == name)
    }

    pub fn region(&self, name: &str) -> Result<&Region> {
        self.regions
            .iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| self.region_not_found(name))
    }

    pub fn region_mut(&mut self, name: &str) -> Result<&mut Region> {
        let idx = self
            .region_index(name)
            .ok_or_else(|| self.region_not_found(name))?;
        Ok(&mut self.regions[idx])
    }

    fn region_not_found(&self, region: &str) -> TcadError {
        TcadError::RegionNotFound {
            device: self.name.clone(),
            region: region.to_string(),
        }
    }

    // ============ Contacts and interfaces ============

    pub fn add_contact(&mut self, name: impl Into<String>, region: &str, nodes: Vec<usize>) -> Result<()> {
        let idx = self
            .region_index(region)
            .ok_or_else(|| self.region_not_found(region))?;
        let r = &self.regions[idx];
        if let Some(&bad) = nodes.iter().find(|&&n| n >= r.node_count()) {
            return Err(TcadError::InvalidTopology {
                region: region.to_string(),
                message: format!("contact node {} out of range", bad),
            });
        }
        let name = name.into();
        if self.contact_index(&name).is_some() {
            return Err(TcadError::InvalidTopology {
                region: region.to_string(),
                message: format!("contact {} already exists", name),
            });
        }
        self.contacts.push(Contact::new(name, idx, nodes));
        Ok(())
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contact_index(&self, name: &str) -> Option<usize> {
        self.contacts.iter().position(|c| c.name() == name)
    }

    pub fn contact(&self, name: &str) -> Result<&Contact> {
        self.contacts
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| TcadError::ContactNotFound {
                device: self.name.clone(),
                contact: name.to_string(),
            })
    }

    /// Add an interface between two distinct regions.
    pub fn add_interface(
        &mut self,
        name: impl Into<String>,
        region0: &str,
        region1: &str,
        pairs: Vec<(usize, usize)>,
    ) -> Result<()> {
        let r0 = self
            .region_index(region0)
            .ok_or_else(|| self.region_not_found(region0))?;
        let r1 = self
            .region_index(region1)
            .ok_or_else(|| self.region_not_found(region1))?;
        if r0 == r1 {
            return Err(TcadError::InvalidTopology {
                region: region0.to_string(),
                message: "interface must join two different regions".to_string(),
            });
        }
        let (n0, n1) = (self.regions[r0].node_count(), self.regions[r1].node_count());
        if let Some(&(a, b)) = pairs.iter().find(|&&(a, b)| a >= n0 || b >= n1) {
            return Err(TcadError::InvalidTopology {
                region: format!("{}/{}", region0, region1),
                message: format!("interface pair ({}, {}) out of range", a, b),
            });
        }
        let name = name.into();
        if self.interface_index(&name).is_some() {
            return Err(TcadError::InvalidTopology {
                region: region0.to_string(),
                message: format!("interface {} already exists", name),
            });
        }
        self.interfaces.push(Interface::new(name, [r0, r1], pairs));
        Ok(())
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface_index(&self, name: &str) -> Option<usize> {
        self.interfaces.iter().position(|i| i.name() == name)
    }

    pub fn interface_mut(&mut self, name: &str) -> Result<&mut Interface> {
        let idx = self
            .interface_index(name)
            .ok_or_else(|| TcadError::InterfaceNotFound {
                device: self.name.clone(),
                interface: name.to_string(),
            })?;
        Ok(&mut self.interfaces[idx])
    }

    // ============ Equations ============

    /// Attach a bulk equation to a region. An equation with the same name replaces the old one.
    pub fn add_bulk_equation(&mut self, region: &str, mut equation: BulkEquation) -> Result<()> {
        let idx = self
            .region_index(region)
            .ok_or_else(|| self.region_not_found(region))?;
        self.check_variable(idx, equation.variable())?;
        equation.bind(&self.name, region, idx);
        self.bulk_equations
            .retain(|e| !(e.region() == idx && e.name() == equation.name()));
        self.bulk_equations.push(equation);
        Ok(())
    }

    /// Attach a contact equation. An equation with the same name replaces the old one.
    pub fn add_contact_equation(&mut self, contact: &str, mut equation: ContactEquation) -> Result<()> {
        let idx = self
            .contact_index(contact)
            .ok_or_else(|| TcadError::ContactNotFound {
                device: self.name.clone(),
                contact: contact.to_string(),
            })?;
        let region = self.contacts[idx].region();
        self.check_variable(region, equation.variable())?;
        equation.bind(&self.name, contact, idx, region);
        self.contact_equations
            .retain(|e| !(e.contact() == idx && e.name() == equation.name()));
        self.contact_equations.push(equation);
        Ok(())
    }

    /// Rebuild a contact equation from its `contact_equation` command record.
    pub fn add_contact_equation_record(&mut self, record: &CommandRecord) -> Result<()> {
        let device = record.require_str("device")?;
        if device != self.name {
            return Err(TcadError::invalid_param(format!(
                "record targets device {}, not {}",
                device, self.name
            )));
        }
        let contact = record.require_str("contact")?.to_string();
        let equation = ContactEquation::from_record(record)?;
        self.add_contact_equation(&contact, equation)
    }

    /// Attach an interface equation. Both regions must carry the variable.
    pub fn add_interface_equation(
        &mut self,
        interface: &str,
        mut equation: InterfaceEquation,
    ) -> Result<()> {
        let idx = self
            .interface_index(interface)
            .ok_or_else(|| TcadError::InterfaceNotFound {
                device: self.name.clone(),
                interface: interface.to_string(),
            })?;
        for r in self.interfaces[idx].regions() {
            self.check_variable(r, equation.variable())?;
        }
        equation.bind(&self.name, interface, idx);
        self.interface_equations
            .retain(|e| !(e.interface() == idx && e.name() == equation.name()));
        self.interface_equations.push(equation);
        Ok(())
    }

    fn check_variable(&self, region: usize, variable: &str) -> Result<()> {
        let r = &self.regions[region];
        r.variable_index(variable)
            .map(|_| ())
            .ok_or_else(|| TcadError::VariableNotFound {
                region: r.name().to_string(),
                variable: variable.to_string(),
            })
    }

    pub fn bulk_equations(&self) -> &[BulkEquation] {
        &self.bulk_equations
    }

    pub fn contact_equations(&self) -> &[ContactEquation] {
        &self.contact_equations
    }

    pub fn interface_equations(&self) -> &[InterfaceEquation] {
        &self.interface_equations
    }

    /// Find a contact equation by contact and equation name.
    pub fn contact_equation(&self, contact: &str, name: &str) -> Result<&ContactEquation> {
        let idx = self
            .contact_index(contact)
            .ok_or_else(|| TcadError::ContactNotFound {
                device: self.name.clone(),
                contact: contact.to_string(),
            })?;
        self.contact_equations
            .iter()
            .find(|e| e.contact() == idx && e.name() == name)
            .ok_or_else(|| TcadError::invalid_param(format!(
                "no equation {} on contact {}",
                name, contact
            )))
    }

    // ============ Numbering ============

    /// Total number of device unknowns.
    pub fn equation_count(&self) -> usize {
        self.regions.iter().map(Region::equation_count).sum()
    }

    /// First equation number of region `idx`.
    pub fn region_base(&self, idx: usize) -> usize {
        self.regions[..idx].iter().map(Region::equation_count).sum()
    }

    /// Global equation number of (`var`, `node`) in region `region`.
    pub fn equation_number(&self, region: usize, var: usize, node: usize) -> usize {
        self.region_base(region) + self.regions[region].equation_offset(var, node)
    }

    /// One block per (region, variable), named `device:region:variable`.
    pub fn equation_blocks(&self) -> Vec<EquationBlock> {
        let mut blocks = Vec::new();
        let mut base = 0;
        for region in &self.regions {
            let n = region.node_count();
            for var in region.variables() {
                blocks.push(EquationBlock {
                    name: format!("{}:{}:{}", self.name, region.name(), var.name()),
                    rows: base..base + n,
                });
                base += n;
            }
        }
        blocks
    }

    /// Initial values of every device unknown.
    pub fn initial_unknowns(&self) -> Vec<f64> {
        self.regions
            .iter()
            .flat_map(|r| {
                r.variables()
                    .iter()
                    .flat_map(|v| v.initial_values().iter().copied())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_region_device() -> Device {
        let mut d = Device::new("diode");
        let mut a = Region::new("left", 2);
        a.add_variable("Potential");
        let mut b = Region::new("right", 3);
        b.add_variable("Potential");
        b.add_variable("Electrons");
        d.add_region(a).unwrap();
        d.add_region(b).unwrap();
        d
    }

    #[test]
    fn test_region_numbering() {
        let d = two_region_device();
        assert_eq!(d.equation_count(), 8);
        assert_eq!(d.region_base(1), 2);
        assert_eq!(d.equation_number(1, 1, 2), 7);
        let blocks = d.equation_blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].name, "diode:right:Electrons");
        assert_eq!(blocks[2].rows, 5..8);
    }

    #[test]
    fn test_duplicate_region_rejected() {
        let mut d = two_region_device();
        assert!(d.add_region(Region::new("left", 1)).is_err());
    }

    #[test]
    fn test_contact_and_interface_validation() {
        let mut d = two_region_device();
        assert!(d.add_contact("c", "left", vec![0]).is_ok());
        assert!(matches!(
            d.add_contact("bad", "left", vec![5]),
            Err(TcadError::InvalidTopology { .. })
        ));
        assert!(matches!(
            d.add_contact("c2", "nowhere", vec![0]),
            Err(TcadError::RegionNotFound { .. })
        ));
        assert!(d.add_interface("i", "left", "right", vec![(1, 0)]).is_ok());
        assert!(d.add_interface("self", "left", "left", vec![(0, 0)]).is_err());
    }

    #[test]
    fn test_equation_needs_variable() {
        let mut d = two_region_device();
        let err = d
            .add_bulk_equation("left", BulkEquation::new("ElectronContinuity", "Electrons"))
            .unwrap_err();
        assert!(matches!(err, TcadError::VariableNotFound { .. }));
        d.add_bulk_equation("right", BulkEquation::new("ElectronContinuity", "Electrons"))
            .unwrap();
        d.add_bulk_equation("right", BulkEquation::new("ElectronContinuity", "Electrons"))
            .unwrap();
        assert_eq!(d.bulk_equations().len(), 1);
    }
}
